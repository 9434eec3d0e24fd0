//! In-memory archive fixtures shared by the integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

/// Builds a ZIP archive entry by entry.
#[derive(Default)]
pub struct ZipBuilder {
    body: Vec<u8>,
    central: Vec<u8>,
    count: u16,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data.len(), 0, data.to_vec(), crc32fast::hash(data))
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let payload = encoder.finish().unwrap();
        self.push(name, data.len(), 8, payload, crc32fast::hash(data))
    }

    pub fn directory(self, name: &str) -> Self {
        assert!(name.ends_with('/'));
        self.push(name, 0, 0, Vec::new(), 0)
    }

    /// Stored entry whose recorded CRC-32 does not match its payload.
    pub fn with_bad_crc(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data.len(), 0, data.to_vec(), !crc32fast::hash(data))
    }

    /// Entry using a compression method nobody supports.
    pub fn with_method(self, name: &str, data: &[u8], method: u16) -> Self {
        self.push(name, data.len(), method, data.to_vec(), crc32fast::hash(data))
    }

    fn push(
        mut self,
        name: &str,
        uncompressed_len: usize,
        method: u16,
        payload: Vec<u8>,
        crc: u32,
    ) -> Self {
        let offset = self.body.len() as u32;
        let name_len = name.len() as u16;
        let compressed = payload.len() as u32;
        let uncompressed = uncompressed_len as u32;

        let lfh = &mut self.body;
        lfh.extend_from_slice(b"PK\x03\x04");
        lfh.extend_from_slice(&20u16.to_le_bytes());
        lfh.extend_from_slice(&0u16.to_le_bytes());
        lfh.extend_from_slice(&method.to_le_bytes());
        lfh.extend_from_slice(&0u16.to_le_bytes());
        lfh.extend_from_slice(&0u16.to_le_bytes());
        lfh.extend_from_slice(&crc.to_le_bytes());
        lfh.extend_from_slice(&compressed.to_le_bytes());
        lfh.extend_from_slice(&uncompressed.to_le_bytes());
        lfh.extend_from_slice(&name_len.to_le_bytes());
        lfh.extend_from_slice(&0u16.to_le_bytes());
        lfh.extend_from_slice(name.as_bytes());
        lfh.extend_from_slice(&payload);

        let cd = &mut self.central;
        cd.extend_from_slice(b"PK\x01\x02");
        cd.extend_from_slice(&20u16.to_le_bytes());
        cd.extend_from_slice(&20u16.to_le_bytes());
        cd.extend_from_slice(&0u16.to_le_bytes());
        cd.extend_from_slice(&method.to_le_bytes());
        cd.extend_from_slice(&0u16.to_le_bytes());
        cd.extend_from_slice(&0u16.to_le_bytes());
        cd.extend_from_slice(&crc.to_le_bytes());
        cd.extend_from_slice(&compressed.to_le_bytes());
        cd.extend_from_slice(&uncompressed.to_le_bytes());
        cd.extend_from_slice(&name_len.to_le_bytes());
        cd.extend_from_slice(&0u16.to_le_bytes()); // extra
        cd.extend_from_slice(&0u16.to_le_bytes()); // comment
        cd.extend_from_slice(&0u16.to_le_bytes()); // disk
        cd.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        cd.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        cd.extend_from_slice(&offset.to_le_bytes());
        cd.extend_from_slice(name.as_bytes());

        self.count += 1;
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with_comment(b"")
    }

    pub fn build_with_comment(self, comment: &[u8]) -> Vec<u8> {
        let mut out = self.body;
        let cd_offset = out.len() as u32;
        let cd_size = self.central.len() as u32;
        out.extend_from_slice(&self.central);

        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(comment);
        out
    }
}

/// Builds a ustar archive entry by entry.
#[derive(Default)]
pub struct TarBuilder {
    out: Vec<u8>,
}

impl TarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.out.extend_from_slice(&tar_header(name, data.len() as u64, b'0'));
        self.append_payload(data);
        self
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.out.extend_from_slice(&tar_header(name, 0, b'5'));
        self
    }

    pub fn symlink(mut self, name: &str) -> Self {
        self.out.extend_from_slice(&tar_header(name, 0, b'2'));
        self
    }

    /// File whose name only fits through a GNU long-name record.
    pub fn long_name_file(mut self, name: &str, data: &[u8]) -> Self {
        let mut payload = name.as_bytes().to_vec();
        payload.push(0);
        self.out
            .extend_from_slice(&tar_header("././@LongLink", payload.len() as u64, b'L'));
        self.append_payload(&payload);
        self.file(&name[..100.min(name.len())], data)
    }

    fn append_payload(&mut self, data: &[u8]) {
        self.out.extend_from_slice(data);
        let pad = (512 - data.len() % 512) % 512;
        self.out.extend(std::iter::repeat_n(0u8, pad));
    }

    pub fn build(mut self) -> Vec<u8> {
        self.out.extend_from_slice(&[0u8; 1024]);
        self.out
    }
}

pub fn tar_header(name: &str, size: u64, typeflag: u8) -> [u8; 512] {
    let mut block = [0u8; 512];
    let name = &name.as_bytes()[..100.min(name.len())];
    block[..name.len()].copy_from_slice(name);
    block[100..107].copy_from_slice(b"0000644");
    block[108..115].copy_from_slice(b"0001750");
    block[116..123].copy_from_slice(b"0001750");
    block[124..135].copy_from_slice(format!("{:011o}", size).as_bytes());
    block[136..147].copy_from_slice(b"14712345670");
    block[156] = typeflag;
    block[257..263].copy_from_slice(b"ustar\0");
    block[263..265].copy_from_slice(b"00");
    block[148..156].fill(b' ');
    let sum: u64 = block.iter().map(|&b| b as u64).sum();
    block[148..155].copy_from_slice(format!("{:06o}\0", sum).as_bytes());
    block
}

/// Sample resources used across tests, in archive order.
pub fn sample_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("config/settings.json", br#"{"theme":"dark","lang":"en"}"#.to_vec()),
        ("fonts/main.ttf", (0..4096u32).map(|i| (i % 251) as u8).collect()),
        ("readme.txt", b"installer resources\n".repeat(40)),
    ]
}
