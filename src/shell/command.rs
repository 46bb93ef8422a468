use std::error::Error;
use std::fs::File;
use std::io::{Read, Write};

use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use crate::disk::{BlockDevice, BLOCK_SIZE};
use crate::fs::FileSystem;

#[derive(Debug)]
pub enum Command {
    Help,
    Format,
    Mount,
    Debug,
    Create,
    Delete(u32),
    GetSize(u32),
    Cat(u32),
    CopyIn(String, u32),
    CopyOut(u32, String),
    Defrag,
    Exit,
}

pub fn execute_command<D: BlockDevice>(
    cmd: &Command,
    fs: &mut FileSystem<D>,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Format => {
            let confirmed = Confirm::new()
                .with_prompt("Formatting erases the entire disk image. Continue?")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Format cancelled.".yellow());
                return Ok(());
            }
            fs.format()?;
            println!("{}", "Disk formatted. Run 'mount' to use it.".green());
        }
        Command::Mount => {
            fs.mount()?;
            println!("{}", "Volume mounted.".green());
        }
        Command::Debug => {
            let report = fs.debug()?;
            print!("{}", report);
        }
        Command::Create => {
            let inumber = fs.create()?;
            println!("Created inode {}", inumber.to_string().green());
        }
        Command::Delete(inumber) => {
            fs.delete(*inumber)?;
            println!("Deleted inode {}", inumber.to_string().red());
        }
        Command::GetSize(inumber) => {
            let size = fs.get_size(*inumber)?;
            println!("Inode {} holds {} bytes", inumber, size.to_string().cyan());
        }
        Command::Cat(inumber) => {
            let bytes = read_all(fs, *inumber)?;
            print!("{}", String::from_utf8_lossy(&bytes));
        }
        Command::CopyIn(path, inumber) => {
            let copied = copy_in(fs, path, *inumber)?;
            println!("Copied {} bytes into inode {}", copied, inumber);
        }
        Command::CopyOut(inumber, path) => {
            let bytes = read_all(fs, *inumber)?;
            File::create(path)?.write_all(&bytes)?;
            println!("Copied {} bytes to {}", bytes.len(), path.cyan());
        }
        Command::Defrag => {
            fs.defrag()?;
            println!("{}", "Volume defragmented.".green());
        }
        Command::Exit => println!("{}", "Exiting...".yellow()),
    }

    Ok(())
}

/// Reads the whole file behind `inumber`, block-sized chunk by chunk, until
/// the filesystem reports a short read.
fn read_all<D: BlockDevice>(fs: &FileSystem<D>, inumber: u32) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut bytes = Vec::new();
    let mut chunk = [0u8; BLOCK_SIZE];
    let mut offset = 0u32;
    loop {
        let copied = fs.read(inumber, &mut chunk, offset)?;
        bytes.extend_from_slice(&chunk[..copied]);
        offset += copied as u32;
        if copied < BLOCK_SIZE {
            return Ok(bytes);
        }
    }
}

/// Streams a host file into the volume. Stops early (with a warning) if the
/// volume runs out of blocks; whatever was written stays in place.
fn copy_in<D: BlockDevice>(
    fs: &mut FileSystem<D>,
    path: &str,
    inumber: u32,
) -> Result<u32, Box<dyn Error>> {
    let mut file = File::open(path)?;
    let total = file.metadata()?.len();

    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {bytes}/{total_bytes}")?
            .progress_chars("=> "),
    );

    let mut chunk = [0u8; BLOCK_SIZE];
    let mut offset = 0u32;
    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        let written = fs.write(inumber, &chunk[..read], offset)?;
        offset += written as u32;
        bar.set_position(offset as u64);
        if written < read {
            bar.abandon();
            println!(
                "{} volume full, {} of {} bytes copied",
                "Warning:".yellow().bold(),
                offset,
                total
            );
            return Ok(offset);
        }
    }
    bar.finish();
    Ok(offset)
}

fn print_help() {
    println!("{}", "SimpleFS commands".bright_cyan().bold());
    println!(
        "{}",
        "
  format               Write a fresh filesystem to the disk image
  mount                Mount the volume and rebuild the bitmaps
  debug                Dump the superblock and every live inode
  create               Allocate a new inode, print its number
  delete <ino>         Free an inode and scrub its blocks
  getsize <ino>        Print a file's size in bytes
  cat <ino>            Print a file's contents
  copyin <file> <ino>  Copy a host file into an inode
  copyout <ino> <file> Copy an inode's contents to a host file
  defrag               Compact live data blocks to the front
  help                 Show this help message
  exit                 Quit the shell
"
        .bright_black()
    );
}
