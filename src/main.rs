use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use fat12::fs::{ImageFile, Volume, VolumeOptions};
use fat12::logger;
use fat12::shell::{Flow, Shell, HELP};

/// Browse a FAT12 disk image read-only
#[derive(Parser, Debug)]
#[command(name = "fat12-browse", version)]
struct Cli {
    /// Disk image to open
    #[arg(default_value = "floppy.img")]
    image: PathBuf,

    /// Stop file output at the size recorded in the directory entry
    #[arg(long)]
    truncate: bool,

    /// Compare every FAT copy against the first one at open
    #[arg(long)]
    check_fats: bool,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn volume_options(&self) -> VolumeOptions {
        VolumeOptions::default().truncate_to_file_size(self.truncate).check_fat_mirrors(self.check_fats)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(logger::level_for_verbosity(cli.verbose)).context("installing logger")?;

    let device = ImageFile::open(&cli.image).with_context(|| format!("opening {}", cli.image.display()))?;
    let volume = Volume::open_with(device, cli.volume_options())
        .with_context(|| format!("mounting {} as FAT12", cli.image.display()))?;
    let mut shell = Shell::new(volume);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", HELP)?;
    shell.execute("ls", &mut out)?;

    let mut line = String::new();
    loop {
        write!(out, "{}", shell.prompt())?;
        out.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line).context("reading command")? == 0 {
            writeln!(out)?;
            break;
        }
        if shell.execute(line.trim(), &mut out)? == Flow::Exit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["fat12-browse"]).unwrap();
        assert_eq!(cli.image, PathBuf::from("floppy.img"));
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.volume_options(), VolumeOptions::default());
    }

    #[test]
    fn flags_map_to_options() {
        let cli = Cli::try_parse_from(["fat12-browse", "disk.img", "--truncate", "--check-fats", "-vv"]).unwrap();
        assert_eq!(cli.image, PathBuf::from("disk.img"));
        assert_eq!(cli.verbose, 2);
        let options = cli.volume_options();
        assert!(options.truncate_to_file_size);
        assert!(options.check_fat_mirrors);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["fat12-browse", "--format"]).is_err());
    }
}
