use crate::error::OpenError;

pub const BLOCK_SIZE: usize = 512;

pub const TYPE_REGULAR: u8 = b'0';
pub const TYPE_REGULAR_OLD: u8 = 0;
pub const TYPE_CONTIGUOUS: u8 = b'7';
pub const TYPE_DIRECTORY: u8 = b'5';
pub const TYPE_GNU_LONG_NAME: u8 = b'L';
pub const TYPE_PAX_LOCAL: u8 = b'x';
pub const TYPE_PAX_GLOBAL: u8 = b'g';

const USTAR_MAGIC: &[u8] = b"ustar\0";

/// One decoded 512-byte tar header block
#[derive(Debug, Clone)]
pub struct TarHeader {
    pub name: String,
    pub size: u64,
    pub typeflag: u8,
}

impl TarHeader {
    /// Decode a header block, verifying its checksum.
    pub fn from_block(block: &[u8; BLOCK_SIZE]) -> Result<Self, OpenError> {
        let stored = parse_numeric(&block[148..156])
            .ok_or_else(|| OpenError::malformed("unreadable tar header checksum"))?;
        if !checksum_matches(block, stored) {
            return Err(OpenError::malformed(format!(
                "tar header checksum {:o} does not match contents",
                stored
            )));
        }

        let size = parse_numeric(&block[124..136])
            .ok_or_else(|| OpenError::malformed("unreadable tar size field"))?;

        let mut name = field_str(&block[0..100]);
        // Only POSIX ustar carries a prefix; GNU reuses that area
        if &block[257..263] == USTAR_MAGIC {
            let prefix = field_str(&block[345..500]);
            if !prefix.is_empty() {
                name = format!("{}/{}", prefix, name);
            }
        }

        Ok(Self {
            name,
            size,
            typeflag: block[156],
        })
    }

    pub fn is_regular(&self) -> bool {
        matches!(
            self.typeflag,
            TYPE_REGULAR | TYPE_REGULAR_OLD | TYPE_CONTIGUOUS
        )
    }
}

/// Cheap sniff used for format detection.
pub fn looks_like_header(block: &[u8; BLOCK_SIZE]) -> bool {
    match parse_numeric(&block[148..156]) {
        Some(stored) => !is_zero_block(block) && checksum_matches(block, stored),
        None => false,
    }
}

pub fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

/// Bytes needed to hold `size` bytes in whole blocks.
pub fn padded_len(size: u64) -> Option<u64> {
    let block = BLOCK_SIZE as u64;
    size.checked_add(block - 1).map(|n| n / block * block)
}

fn checksum_matches(block: &[u8; BLOCK_SIZE], stored: u64) -> bool {
    // Checksum field counts as eight spaces
    let mut unsigned: u64 = 0;
    let mut signed: i64 = 0;
    for (i, &b) in block.iter().enumerate() {
        let b = if (148..156).contains(&i) { b' ' } else { b };
        unsigned += b as u64;
        signed += b as i8 as i64;
    }
    stored == unsigned || stored as i64 == signed
}

/// Octal (NUL or space terminated) or GNU base-256 numeric field.
fn parse_numeric(field: &[u8]) -> Option<u64> {
    if field.first().is_some_and(|&b| b & 0x80 != 0) {
        if field[0] == 0xFF {
            return None; // negative
        }
        let mut value: u64 = (field[0] & 0x7F) as u64;
        for &b in &field[1..] {
            value = value.checked_mul(256)?.checked_add(b as u64)?;
        }
        return Some(value);
    }

    let digits = field
        .iter()
        .skip_while(|&&b| b == b' ' || b == 0)
        .take_while(|&&b| b != b' ' && b != 0);
    let mut value: u64 = 0;
    for &b in digits {
        if !(b'0'..=b'7').contains(&b) {
            return None;
        }
        value = value.checked_mul(8)?.checked_add((b - b'0') as u64)?;
    }
    Some(value)
}

fn field_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).to_string()
}

/// Extract `path` and `size` overrides from a pax extended header payload.
pub fn parse_pax(data: &[u8]) -> (Option<String>, Option<u64>) {
    let mut path = None;
    let mut size = None;
    let mut rest = data;

    while let Some(space) = rest.iter().position(|&b| b == b' ') {
        let Some(len) = std::str::from_utf8(&rest[..space])
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        else {
            break;
        };
        if len <= space + 1 || len > rest.len() {
            break;
        }
        let record = &rest[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(eq) = record.iter().position(|&b| b == b'=') {
            let value = &record[eq + 1..];
            match &record[..eq] {
                b"path" => path = Some(String::from_utf8_lossy(value).to_string()),
                b"size" => {
                    size = std::str::from_utf8(value).ok().and_then(|s| s.parse().ok());
                }
                _ => {}
            }
        }
        rest = &rest[len..];
    }

    (path, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, size: u64, typeflag: u8) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[..name.len()].copy_from_slice(name.as_bytes());
        block[124..135].copy_from_slice(format!("{:011o}", size).as_bytes());
        block[156] = typeflag;
        block[257..263].copy_from_slice(USTAR_MAGIC);
        block[148..156].fill(b' ');
        let sum: u64 = block.iter().map(|&b| b as u64).sum();
        block[148..155].copy_from_slice(format!("{:06o}\0", sum).as_bytes());
        block
    }

    #[test]
    fn decodes_regular_header() {
        let block = header("data/readme.txt", 1234, TYPE_REGULAR);
        assert!(looks_like_header(&block));
        let h = TarHeader::from_block(&block).unwrap();
        assert_eq!(h.name, "data/readme.txt");
        assert_eq!(h.size, 1234);
        assert!(h.is_regular());
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut block = header("a.txt", 1, TYPE_REGULAR);
        block[0] = b'b';
        assert!(!looks_like_header(&block));
        assert!(matches!(
            TarHeader::from_block(&block),
            Err(OpenError::Malformed(_))
        ));
    }

    #[test]
    fn numeric_fields() {
        assert_eq!(parse_numeric(b"00000000012\0"), Some(10));
        assert_eq!(parse_numeric(b"   17 \0"), Some(15));
        assert_eq!(parse_numeric(b"\0\0\0"), Some(0));
        assert_eq!(parse_numeric(&[0x80, 0, 0, 0, 0, 0, 1, 0]), Some(256));
        assert_eq!(parse_numeric(b"0009"), None);
    }

    #[test]
    fn pax_overrides() {
        let data = b"28 path=some/very/long/name\n11 size=42\n20 mtime=1700000000\n";
        let (path, size) = parse_pax(data);
        assert_eq!(path.as_deref(), Some("some/very/long/name"));
        assert_eq!(size, Some(42));
    }

    #[test]
    fn padding() {
        assert_eq!(padded_len(0), Some(0));
        assert_eq!(padded_len(1), Some(512));
        assert_eq!(padded_len(512), Some(512));
        assert_eq!(padded_len(513), Some(1024));
    }
}
