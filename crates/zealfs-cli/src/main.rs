//! `zealctl`: a minimal, non-GUI driver over the `zealfs-part` registry/editor and the
//! `zealfs-fs` engine, analogous in spirit to `hadris-cli`'s thin `clap::Parser` wrapper
//! around `hadris::FileSystem`.

use std::fs;
use std::io::{Read, Write as IoWrite};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use zealfs_common::{MbrSector, SystemTimeSource};
use zealfs_fs::Session;
use zealfs_io::{BlockDevice, ImageFile};
use zealfs_part::{Editor, Registry};

#[derive(Debug, Parser)]
#[command(name = "zealctl", about = "Create and browse ZealFS v2 disk images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the partition table of a disk image.
    List {
        image: PathBuf,
    },
    /// Create a new sparse disk image.
    CreateImage {
        image: PathBuf,
        #[arg(long)]
        size: u64,
        #[arg(long)]
        mbr: bool,
    },
    /// Allocate a new ZealFS v2 partition in the largest free gap.
    Alloc {
        image: PathBuf,
        #[arg(long)]
        size: u64,
        #[arg(long, default_value_t = 512)]
        align: u64,
    },
    /// Re-format an already-allocated partition in place.
    Mkfs {
        image: PathBuf,
        #[arg(long)]
        partition: usize,
    },
    /// List a directory's contents.
    Ls {
        image: PathBuf,
        #[arg(long)]
        partition: usize,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file's contents to stdout.
    Cat {
        image: PathBuf,
        #[arg(long)]
        partition: usize,
        path: String,
    },
    /// Copy a local file into the image.
    Put {
        image: PathBuf,
        #[arg(long)]
        partition: usize,
        local: PathBuf,
        dest: String,
    },
    /// Copy a file out of the image to local disk.
    Get {
        image: PathBuf,
        #[arg(long)]
        partition: usize,
        src: String,
        local: PathBuf,
    },
    /// Create a directory.
    Mkdir {
        image: PathBuf,
        #[arg(long)]
        partition: usize,
        path: String,
    },
    /// Remove a file or (with `--dir`) an empty directory.
    Rm {
        image: PathBuf,
        #[arg(long)]
        partition: usize,
        path: String,
        #[arg(long)]
        dir: bool,
    },
    /// Report total and free space on a partition.
    Df {
        image: PathBuf,
        #[arg(long)]
        partition: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::List { image } => cmd_list(&image),
        Command::CreateImage { image, size, mbr } => cmd_create_image(&image, size, mbr),
        Command::Alloc { image, size, align } => cmd_alloc(&image, size, align),
        Command::Mkfs { image, partition } => cmd_mkfs(&image, partition),
        Command::Ls { image, partition, path } => cmd_ls(&image, partition, &path),
        Command::Cat { image, partition, path } => cmd_cat(&image, partition, &path),
        Command::Put { image, partition, local, dest } => cmd_put(&image, partition, &local, &dest),
        Command::Get { image, partition, src, local } => cmd_get(&image, partition, &src, &local),
        Command::Mkdir { image, partition, path } => cmd_mkdir(&image, partition, &path),
        Command::Rm { image, partition, path, dir } => cmd_rm(&image, partition, &path, dir),
        Command::Df { image, partition } => cmd_df(&image, partition),
    }
}

fn cmd_list(image: &PathBuf) -> Result<()> {
    let mut registry = Registry::new();
    let index = registry.load_image(image)?;
    registry.select(index, None);
    let disk = registry.current_disk_mut().ok_or_else(|| anyhow!("no disk loaded"))?;
    let editor = Editor::new(disk);
    for (slot, entry) in editor.partitions().iter().enumerate() {
        if entry.is_active() {
            println!(
                "[{slot}] type=0x{:02X} start_lba={} size_sectors={}",
                entry.partition_type, entry.start_lba, entry.size_sectors
            );
        } else {
            println!("[{slot}] (empty)");
        }
    }
    Ok(())
}

fn cmd_create_image(image: &PathBuf, size: u64, mbr: bool) -> Result<()> {
    let mut registry = Registry::new();
    registry.create_image(image, size, mbr)?;
    info!("created {} ({size} bytes)", image.display());
    Ok(())
}

fn cmd_alloc(image: &PathBuf, size: u64, align: u64) -> Result<()> {
    let mut registry = Registry::new();
    let index = registry.load_image(image)?;
    registry.select(index, None);
    let disk = registry.current_disk_mut().ok_or_else(|| anyhow!("no disk loaded"))?;
    let mut editor = Editor::new(disk);
    let gap = editor
        .free_gap()
        .ok_or_else(|| anyhow!("no free space on {}", image.display()))?;
    let (start_lba, available_sectors) = editor.max_partition_size(gap, align);
    let wanted_sectors = size.div_ceil(512);
    if wanted_sectors > available_sectors {
        bail!(
            "requested {size} bytes does not fit the largest free gap ({} sectors available)",
            available_sectors
        );
    }
    let slot = editor.allocate_partition(start_lba, wanted_sectors)?;
    let mut device = ImageFile::open(image)?;
    editor.write_changes(&mut device)?;
    println!("allocated partition {slot} at lba {start_lba} ({wanted_sectors} sectors)");
    Ok(())
}

fn cmd_mkfs(image: &PathBuf, partition: usize) -> Result<()> {
    let mut registry = Registry::new();
    let index = registry.load_image(image)?;
    registry.select(index, None);
    let disk = registry.current_disk_mut().ok_or_else(|| anyhow!("no disk loaded"))?;
    let mut editor = Editor::new(disk);
    editor.format_partition(partition)?;
    let mut device = ImageFile::open(image)?;
    editor.write_changes(&mut device)?;
    println!("formatted partition {partition}");
    Ok(())
}

fn partition_offset(image: &PathBuf, partition: usize) -> Result<u64> {
    let mut device = ImageFile::open(image)?;
    let mut sector = [0u8; 512];
    device.read(0, &mut sector)?;
    let mbr = MbrSector::from_bytes(sector);
    let entry = mbr
        .partitions()
        .get(partition)
        .copied()
        .ok_or_else(|| anyhow!("no such partition slot {partition}"))?;
    if !entry.is_active() {
        bail!("partition slot {partition} is not active");
    }
    Ok(entry.start_lba as u64 * 512)
}

fn open_session(image: &PathBuf, partition: usize) -> Result<Session<ImageFile>> {
    let offset = partition_offset(image, partition)?;
    let device = ImageFile::open(image).with_context(|| format!("opening {}", image.display()))?;
    Ok(Session::new(device, offset))
}

fn cmd_ls(image: &PathBuf, partition: usize, path: &str) -> Result<()> {
    let mut session = open_session(image, partition)?;
    let dir = session.opendir(path)?;
    for entry in session.readdir(&dir, usize::MAX)? {
        let marker = if entry.is_dir { "/" } else { "" };
        println!("{}{marker}\t{}", entry.name, entry.size);
    }
    Ok(())
}

fn cmd_cat(image: &PathBuf, partition: usize, path: &str) -> Result<()> {
    let mut session = open_session(image, partition)?;
    let handle = session.open(path)?;
    let mut buf = vec![0u8; handle.len() as usize];
    session.read(&handle, &mut buf, 0)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}

fn cmd_put(image: &PathBuf, partition: usize, local: &PathBuf, dest: &str) -> Result<()> {
    let mut session = open_session(image, partition)?;
    let time = SystemTimeSource;
    let mut contents = Vec::new();
    fs::File::open(local)
        .with_context(|| format!("opening {}", local.display()))?
        .read_to_end(&mut contents)?;
    let mut handle = session.create(dest, &time)?;
    session.write(&mut handle, &contents, 0)?;
    session.flush(&handle)?;
    println!("wrote {} bytes to {dest}", contents.len());
    Ok(())
}

fn cmd_get(image: &PathBuf, partition: usize, src: &str, local: &PathBuf) -> Result<()> {
    let mut session = open_session(image, partition)?;
    let handle = session.open(src)?;
    let mut buf = vec![0u8; handle.len() as usize];
    session.read(&handle, &mut buf, 0)?;
    fs::File::create(local)
        .with_context(|| format!("creating {}", local.display()))?
        .write_all(&buf)?;
    println!("wrote {} bytes to {}", buf.len(), local.display());
    Ok(())
}

fn cmd_mkdir(image: &PathBuf, partition: usize, path: &str) -> Result<()> {
    let mut session = open_session(image, partition)?;
    let time = SystemTimeSource;
    let handle = session.mkdir(path, &time)?;
    session.flush(&handle)?;
    Ok(())
}

fn cmd_rm(image: &PathBuf, partition: usize, path: &str, dir: bool) -> Result<()> {
    let mut session = open_session(image, partition)?;
    if dir {
        session.rmdir(path)?;
    } else {
        session.unlink(path)?;
    }
    Ok(())
}

fn cmd_df(image: &PathBuf, partition: usize) -> Result<()> {
    let mut session = open_session(image, partition)?;
    // Force a mount so totals reflect the on-disk header rather than defaults.
    let _ = session.opendir("/")?;
    let report = session.df();
    println!(
        "total={} free={} used={}",
        report.total_bytes,
        report.free_bytes,
        report.used_bytes()
    );
    Ok(())
}
