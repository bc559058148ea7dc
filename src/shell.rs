//! Line-oriented browser over an open volume.
//!
//! The shell owns the volume and a `Navigator`; every navigation move
//! refetches the directory listing that numeric indices refer to.

use std::io::{self, Write};

use crate::fs::block_device::BlockDevice;
use crate::fs::directory::DirectoryEntry;
use crate::fs::navigation::{Navigator, Opened};
use crate::fs::volume::{FsError, Volume};

pub const HELP: &str = "Commands: help, ls, cd <index|name|path|..|/>, cat <index|name|path>, <index>, back, root, pwd, info, label, exit";

/// How a command names an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Index(usize),
    Name(String),
    /// Absolute or multi-component path, resolved from the root.
    Path(String),
}

impl Target {
    fn parse(arg: &str) -> Self {
        if let Ok(i) = arg.parse::<usize>() {
            Target::Index(i)
        } else if arg.contains('/') {
            Target::Path(arg.to_string())
        } else {
            Target::Name(arg.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    /// Enter a directory or stream a file, depending on the entry.
    Open(Target),
    ChangeDir(Target),
    Cat(Target),
    Back,
    Root,
    Pwd,
    Info,
    Label,
    Exit,
}

/// Parse one input line. `Ok(None)` for blank lines, `Err(usage)` for
/// malformed commands.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c.to_ascii_lowercase(),
        None => return Ok(None),
    };
    let arg = parts.next();
    let command = match (cmd.as_str(), arg) {
        ("help" | "?", _) => Command::Help,
        ("ls" | "dir", _) => Command::List,
        ("cd", Some("..")) => Command::Back,
        ("cd", Some("/")) => Command::Root,
        ("cd", Some(a)) => Command::ChangeDir(Target::parse(a)),
        ("cd", None) => return Err(String::from("usage: cd <index|name|path|..|/>")),
        ("cat" | "read", Some(a)) => Command::Cat(Target::parse(a)),
        ("cat" | "read", None) => return Err(String::from("usage: cat <index|name|path>")),
        ("back" | "..", _) => Command::Back,
        ("root", _) => Command::Root,
        ("pwd", _) => Command::Pwd,
        ("info", _) => Command::Info,
        ("label", _) => Command::Label,
        ("exit" | "quit" | "-1", _) => Command::Exit,
        (other, _) => match other.parse::<usize>() {
            Ok(i) => Command::Open(Target::Index(i)),
            Err(_) => return Err(format!("unknown command: {}", other)),
        },
    };
    Ok(Some(command))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell<D: BlockDevice> {
    volume: Volume<D>,
    nav: Navigator,
    listing: Option<Vec<DirectoryEntry>>,
}

impl<D: BlockDevice> Shell<D> {
    pub fn new(volume: Volume<D>) -> Self {
        Shell { volume, nav: Navigator::new(), listing: None }
    }

    pub fn volume(&self) -> &Volume<D> {
        &self.volume
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn prompt(&self) -> String {
        format!("{}> ", self.nav.path())
    }

    /// Entries of the current directory, fetched on first use after a move.
    pub fn entries<W: Write>(&mut self, out: &mut W) -> io::Result<&[DirectoryEntry]> {
        if self.listing.is_none() {
            let listing = self.volume.read_directory(Some(self.nav.current()));
            if let Some(e) = &listing.error {
                writeln!(out, "warning: listing incomplete: {}", e)?;
            }
            self.listing = Some(listing.entries);
        }
        Ok(self.listing.as_deref().unwrap_or(&[]))
    }

    fn moved(&mut self) {
        self.listing = None;
    }

    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<Flow> {
        let command = match parse_command(line) {
            Ok(Some(c)) => c,
            Ok(None) => return Ok(Flow::Continue),
            Err(usage) => {
                writeln!(out, "{}", usage)?;
                return Ok(Flow::Continue);
            }
        };
        log::debug!("shell command {:?}", command);

        match command {
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::List => self.list(out)?,
            Command::Open(target) => {
                if let Some(entry) = self.resolve(&target, out)? {
                    self.open(&entry, out)?;
                }
            }
            Command::ChangeDir(Target::Path(path)) => self.enter_path(&path, out)?,
            Command::ChangeDir(target) => {
                if let Some(entry) = self.resolve(&target, out)? {
                    if entry.is_dir() {
                        self.open(&entry, out)?;
                    } else {
                        writeln!(out, "{}", FsError::NotADirectory(entry.name))?;
                    }
                }
            }
            Command::Cat(target) => {
                if let Some(entry) = self.resolve(&target, out)? {
                    self.cat(&entry, out)?;
                }
            }
            Command::Back => {
                self.nav.back();
                self.moved();
                self.list(out)?;
            }
            Command::Root => {
                self.nav.reset_to_root();
                self.moved();
                self.list(out)?;
            }
            Command::Pwd => writeln!(out, "{}", self.nav.path())?,
            Command::Info => self.info(out)?,
            Command::Label => match self.volume.volume_label() {
                Some(label) => writeln!(out, "{}", label)?,
                None => writeln!(out, "(no label)")?,
            },
            Command::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    fn resolve<W: Write>(&mut self, target: &Target, out: &mut W) -> io::Result<Option<DirectoryEntry>> {
        let found = match target {
            Target::Index(i) => self.entries(out)?.get(*i).cloned(),
            Target::Name(name) => self.entries(out)?.iter().find(|e| e.matches(name)).cloned(),
            Target::Path(path) => match self.volume.find(path) {
                Ok(entry) => entry,
                Err(e) => {
                    writeln!(out, "{}", e)?;
                    return Ok(None);
                }
            },
        };
        if found.is_none() {
            match target {
                Target::Index(i) => writeln!(out, "invalid index {}", i)?,
                Target::Name(name) | Target::Path(name) => writeln!(out, "{}", FsError::NotFound(name.clone()))?,
            }
        }
        Ok(found)
    }

    fn open<W: Write>(&mut self, entry: &DirectoryEntry, out: &mut W) -> io::Result<()> {
        match self.nav.open(entry) {
            Opened::Entered(_) | Opened::Left(_) => {
                self.moved();
                self.list(out)
            }
            Opened::File(file) => self.cat(&file, out),
        }
    }

    fn enter_path<W: Write>(&mut self, path: &str, out: &mut W) -> io::Result<()> {
        if path.starts_with('/') {
            self.nav.reset_to_root();
            self.moved();
        }
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let entry = self.entries(out)?.iter().find(|e| e.matches(part)).cloned();
            match entry {
                Some(e) if e.is_dir() => {
                    self.nav.open(&e);
                    self.moved();
                }
                Some(e) => {
                    writeln!(out, "{}", FsError::NotADirectory(e.name))?;
                    break;
                }
                None => {
                    writeln!(out, "{}", FsError::NotFound(part.to_string()))?;
                    break;
                }
            }
        }
        self.list(out)
    }

    fn cat<W: Write>(&mut self, entry: &DirectoryEntry, out: &mut W) -> io::Result<()> {
        if entry.is_dir() {
            return writeln!(out, "{}", FsError::IsADirectory(entry.name.clone()));
        }
        let stream = self.volume.read_entry(entry, out);
        writeln!(out)?;
        if let Some(e) = stream.error {
            writeln!(out, "error after {} bytes: {}", stream.bytes_written, e)?;
        }
        Ok(())
    }

    fn list<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let entries = self.entries(out)?.to_vec();
        writeln!(out, "{}", self.nav.path())?;
        writeln!(out, "{:<6} {:<12} {:>8}  {:<4}  Modified", "Index", "Name", "Size", "Type")?;
        for (i, e) in entries.iter().enumerate() {
            writeln!(
                out,
                "{:<6} {:<12} {:>8}  {:<4}  {}",
                i,
                e.name,
                e.file_size,
                if e.is_dir() { "DIR" } else { "FILE" },
                e.modified
            )?;
        }
        Ok(())
    }

    fn info<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let boot = *self.volume.boot_sector();
        let geo = *self.volume.geometry();
        writeln!(out, "OEM name:            {}", boot.oem_name_str())?;
        writeln!(out, "Bytes per sector:    {}", geo.bytes_per_sector)?;
        writeln!(out, "Sectors per cluster: {}", geo.sectors_per_cluster)?;
        writeln!(out, "Reserved sectors:    {}", geo.reserved_sectors)?;
        writeln!(out, "FAT copies:          {} x {} sectors", geo.fat_count, geo.fat_size)?;
        writeln!(out, "Root entries:        {}", geo.root_entry_count)?;
        writeln!(out, "Media descriptor:    {:#04x}", geo.media_descriptor)?;
        writeln!(out, "Total sectors:       {}", geo.total_sectors)?;
        writeln!(out, "Root dir sector:     {} ({} sectors)", geo.root_dir_start_sector, geo.root_dir_sector_count)?;
        writeln!(out, "Data region sector:  {}", geo.data_region_start)?;
        writeln!(out, "Clusters:            {}", geo.cluster_count)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("LS"), Ok(Some(Command::List)));
        assert_eq!(parse_command("cd .."), Ok(Some(Command::Back)));
        assert_eq!(parse_command("cd /"), Ok(Some(Command::Root)));
        assert_eq!(parse_command("cd 3"), Ok(Some(Command::ChangeDir(Target::Index(3)))));
        assert_eq!(parse_command("cd docs"), Ok(Some(Command::ChangeDir(Target::Name("docs".into())))));
        assert_eq!(parse_command("cat /DOCS/A.TXT"), Ok(Some(Command::Cat(Target::Path("/DOCS/A.TXT".into())))));
        assert_eq!(parse_command("2"), Ok(Some(Command::Open(Target::Index(2)))));
        assert_eq!(parse_command("-1"), Ok(Some(Command::Exit)));
        assert!(parse_command("cat").is_err());
        assert!(parse_command("format a:").is_err());
    }
}
