use async_trait::async_trait;
use tracing::debug;
use crate::errors::ReverieError;
use super::{ensure_readable, Tool, ToolArgs, ToolOutput, ToolRequest};

const SHT_SYMTAB: u32 = 2;
const PT_INTERP: u32 = 3;

/// Identifies the container format of the target from its headers:
/// format, word size, endianness, type, machine, linkage and symbol presence.
pub struct FileProbe;

#[async_trait]
impl Tool for FileProbe {
    fn name(&self) -> &'static str {
        "file"
    }

    fn default_args(&self) -> ToolArgs {
        ToolArgs::PathOnly
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ReverieError> {
        ensure_readable(&request.binary_path)?;
        let bytes = tokio::fs::read(&request.binary_path).await?;
        let description = describe(&bytes);
        debug!(path = %request.binary_path.display(), %description, "Format probe");
        Ok(ToolOutput::text(format!("{}: {}", request.binary_path.display(), description)))
    }
}

/// One-line description of a file's format.
pub fn describe(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "empty".to_string();
    }
    if bytes.starts_with(b"\x7fELF") {
        return describe_elf(bytes).unwrap_or_else(|| "ELF (truncated header)".to_string());
    }
    if bytes.starts_with(b"MZ") {
        return describe_pe(bytes).unwrap_or_else(|| "MS-DOS executable".to_string());
    }
    if let Some(desc) = describe_macho(bytes) {
        return desc;
    }
    if bytes.starts_with(b"#!") {
        let line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
        return format!("script text executable ({})", String::from_utf8_lossy(&line[2..]).trim());
    }
    let sample = &bytes[..bytes.len().min(512)];
    if sample.iter().all(|b| b.is_ascii_graphic() || b.is_ascii_whitespace()) {
        "ASCII text".to_string()
    } else {
        "data".to_string()
    }
}

#[derive(Clone, Copy)]
struct Reader<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl<'a> Reader<'a> {
    fn u16(&self, off: usize) -> Option<u16> {
        let b: [u8; 2] = self.bytes.get(off..off.checked_add(2)?)?.try_into().ok()?;
        Some(if self.little_endian { u16::from_le_bytes(b) } else { u16::from_be_bytes(b) })
    }

    fn u32(&self, off: usize) -> Option<u32> {
        let b: [u8; 4] = self.bytes.get(off..off.checked_add(4)?)?.try_into().ok()?;
        Some(if self.little_endian { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) })
    }

    fn u64(&self, off: usize) -> Option<u64> {
        let b: [u8; 8] = self.bytes.get(off..off.checked_add(8)?)?.try_into().ok()?;
        Some(if self.little_endian { u64::from_le_bytes(b) } else { u64::from_be_bytes(b) })
    }

    /// Word-sized field: u64 for 64-bit images, u32 otherwise.
    fn word(&self, off: usize, is64: bool) -> Option<u64> {
        if is64 { self.u64(off) } else { self.u32(off).map(u64::from) }
    }
}

fn describe_elf(bytes: &[u8]) -> Option<String> {
    let is64 = match bytes.get(4)? {
        1 => false,
        2 => true,
        _ => return None,
    };
    let little_endian = *bytes.get(5)? != 2;
    let r = Reader { bytes, little_endian };

    let e_type = r.u16(16)?;
    let machine = elf_machine(r.u16(18)?);
    let entry = r.word(24, is64)?;
    let (phoff, shoff) = if is64 { (r.u64(32)?, r.u64(40)?) } else { (r.u32(28)? as u64, r.u32(32)? as u64) };
    let (phentsize, phnum, shentsize, shnum) = if is64 {
        (r.u16(54)?, r.u16(56)?, r.u16(58)?, r.u16(60)?)
    } else {
        (r.u16(42)?, r.u16(44)?, r.u16(46)?, r.u16(48)?)
    };

    let interpreter = (0..phnum as usize).find_map(|i| {
        let ph = (phoff as usize).checked_add(i.checked_mul(phentsize as usize)?)?;
        if r.u32(ph)? != PT_INTERP {
            return None;
        }
        let (offset, size) = if is64 {
            (r.u64(ph + 8)?, r.u64(ph + 32)?)
        } else {
            (r.u32(ph + 4)? as u64, r.u32(ph + 16)? as u64)
        };
        let raw = bytes.get(offset as usize..offset.checked_add(size)? as usize)?;
        Some(String::from_utf8_lossy(raw).trim_end_matches('\0').to_string())
    });

    let has_symtab = (0..shnum as usize).any(|i| {
        (shoff as usize)
            .checked_add(i * shentsize as usize + 4)
            .and_then(|off| r.u32(off))
            == Some(SHT_SYMTAB)
    });

    let kind = match (e_type, &interpreter) {
        (1, _) => "relocatable",
        (2, _) => "executable",
        (3, Some(_)) => "pie executable",
        (3, None) => "shared object",
        (4, _) => "core file",
        _ => "unknown type",
    };

    let mut parts = vec![
        format!(
            "ELF {}-bit {} {}",
            if is64 { 64 } else { 32 },
            if little_endian { "LSB" } else { "MSB" },
            kind
        ),
        machine,
    ];
    match &interpreter {
        Some(interp) => {
            parts.push("dynamically linked".to_string());
            parts.push(format!("interpreter {}", interp));
        }
        None if e_type == 2 => parts.push("statically linked".to_string()),
        None => {}
    }
    if entry != 0 {
        parts.push(format!("entry point 0x{:x}", entry));
    }
    if shnum > 0 {
        parts.push(if has_symtab { "not stripped" } else { "stripped" }.to_string());
    } else {
        parts.push("no section header".to_string());
    }
    Some(parts.join(", "))
}

fn elf_machine(machine: u16) -> String {
    match machine {
        3 => "Intel 80386".into(),
        8 => "MIPS".into(),
        20 => "PowerPC".into(),
        21 => "64-bit PowerPC".into(),
        40 => "ARM".into(),
        62 => "x86-64".into(),
        183 => "ARM aarch64".into(),
        243 => "RISC-V".into(),
        other => format!("machine 0x{:x}", other),
    }
}

fn describe_pe(bytes: &[u8]) -> Option<String> {
    let r = Reader { bytes, little_endian: true };
    let pe = r.u32(0x3c)? as usize;
    if bytes.get(pe..pe + 4)? != b"PE\0\0" {
        return None;
    }
    let machine = match r.u16(pe + 4)? {
        0x14c => "Intel 80386".to_string(),
        0x8664 => "x86-64".to_string(),
        0x1c0 | 0x1c4 => "ARM".to_string(),
        0xaa64 => "Aarch64".to_string(),
        other => format!("machine 0x{:x}", other),
    };
    let characteristics = r.u16(pe + 22)?;
    let optional = pe + 24;
    let format = match r.u16(optional)? {
        0x20b => "PE32+",
        _ => "PE32",
    };
    let subsystem = match r.u16(optional + 68) {
        Some(2) => " (GUI)",
        Some(3) => " (console)",
        _ => "",
    };
    let kind = if characteristics & 0x2000 != 0 { "executable (DLL)" } else { "executable" };
    Some(format!("{} {}{} {}, for MS Windows", format, kind, subsystem, machine))
}

fn describe_macho(bytes: &[u8]) -> Option<String> {
    let head: [u8; 4] = bytes.get(0..4)?.try_into().ok()?;
    let (is64, little_endian) = match head {
        [0xce, 0xfa, 0xed, 0xfe] => (false, true),
        [0xcf, 0xfa, 0xed, 0xfe] => (true, true),
        [0xfe, 0xed, 0xfa, 0xce] => (false, false),
        [0xfe, 0xed, 0xfa, 0xcf] => (true, false),
        [0xca, 0xfe, 0xba, 0xbe] if bytes.get(7).is_some_and(|n| *n > 0 && *n < 20) => {
            return Some("Mach-O universal binary".to_string());
        }
        _ => return None,
    };
    let r = Reader { bytes, little_endian };
    let cpu = match r.u32(4)? {
        7 => "i386",
        0x0100_0007 => "x86_64",
        12 => "arm",
        0x0100_000c => "arm64",
        18 => "ppc",
        _ => "unknown arch",
    };
    let filetype = match r.u32(12)? {
        1 => "object",
        2 => "executable",
        6 => "dynamically linked shared library",
        8 => "bundle",
        _ => "file",
    };
    Some(format!("Mach-O {}-bit {} {}", if is64 { 64 } else { 32 }, cpu, filetype))
}
