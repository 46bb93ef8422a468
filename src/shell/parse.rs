use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "format" => Some(Command::Format),
        "mount" => Some(Command::Mount),
        "debug" => Some(Command::Debug),
        "create" => Some(Command::Create),
        "delete" => parse_inumber(args.first()?).map(Command::Delete),
        "getsize" => parse_inumber(args.first()?).map(Command::GetSize),
        "cat" => parse_inumber(args.first()?).map(Command::Cat),
        "copyin" => {
            if args.len() == 2 {
                Some(Command::CopyIn(args[0].to_string(), parse_inumber(args[1])?))
            } else {
                None
            }
        }
        "copyout" => {
            if args.len() == 2 {
                Some(Command::CopyOut(parse_inumber(args[0])?, args[1].to_string()))
            } else {
                None
            }
        }
        "defrag" => Some(Command::Defrag),
        "exit" => Some(Command::Exit),
        _ => None,
    }
}

fn parse_inumber(token: &str) -> Option<u32> {
    token.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_inode_arguments() {
        assert!(matches!(parse_command("delete 3"), Some(Command::Delete(3))));
        assert!(matches!(parse_command("getsize 12"), Some(Command::GetSize(12))));
        assert!(matches!(
            parse_command("copyin notes.txt 2"),
            Some(Command::CopyIn(_, 2))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_command("").is_none());
        assert!(parse_command("delete").is_none());
        assert!(parse_command("delete abc").is_none());
        assert!(parse_command("frobnicate").is_none());
    }
}
