/// M64 movie header.
///
/// Fixed 1024-byte little-endian block at the start of every movie file:
///   [0x000] magic "M64\x1A", version, uid, length_vis, rerecord_count (low)
///   [0x014] vis_per_second, num_controllers, extended_version, extended_flags
///   [0x018] length_samples, start_flags, reserved, controller_flags
///   [0x024] extended data: authorship tag, bruteforce data, rerecord_count (high)
///   [0x044] legacy author/description, rom name/crc/country, reserved
///   [0x122] video/audio/input/rsp plugin names
///   [0x222] author (UTF-8), [0x300] description (UTF-8)
use super::MovieError;
use crate::savestate::cursor::{StateReader, StateWriter};

pub const HEADER_SIZE: usize = 1024;
pub const MAGIC: u32 = 0x1A34_364D;
pub const VERSION: u32 = 3;
pub const EXTENDED_VERSION: u8 = 1;
pub const AUTHORSHIP_TAG: [u8; 4] = *b"MUPN";

pub const OLD_AUTHOR_LEN: usize = 48;
pub const OLD_DESCRIPTION_LEN: usize = 80;
pub const ROM_NAME_LEN: usize = 32;
pub const PLUGIN_NAME_LEN: usize = 64;
pub const AUTHOR_LEN: usize = 222;
pub const DESCRIPTION_LEN: usize = 256;
const RESERVED_LEN: usize = 56;
const EXTENDED_RESERVED_LEN: usize = 20;

/// What a movie expects to start from.
pub mod start_flags {
    pub const FROM_SNAPSHOT: u16 = 1 << 0;
    pub const FROM_NOTHING: u16 = 1 << 1;
    pub const FROM_EEPROM: u16 = 1 << 2;
    pub const FROM_EXISTING_SNAPSHOT: u16 = 1 << 3;
}

/// Per-controller bits in `controller_flags`.
pub mod controller {
    pub const fn present(i: usize) -> u32 {
        1 << i
    }

    pub const fn mempak(i: usize) -> u32 {
        1 << (i + 4)
    }

    pub const fn rumble(i: usize) -> u32 {
        1 << (i + 8)
    }
}

pub const EXT_FLAG_WII_VC: u8 = 1 << 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginNames {
    pub video: String,
    pub audio: String,
    pub input: String,
    pub rsp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieHeader {
    pub version: u32,
    /// Creation time; ties savestates to the movie they were made with.
    pub uid: u32,
    pub length_vis: u32,
    /// Low and extended-high words combined.
    pub rerecord_count: u64,
    pub vis_per_second: u8,
    pub num_controllers: u8,
    /// 0 on movies predating the extended block.
    pub extended_version: u8,
    pub extended_flags: u8,
    pub length_samples: u32,
    pub start_flags: u16,
    pub controller_flags: u32,
    pub authorship_tag: [u8; 4],
    pub bruteforce_extra_data: u32,
    pub old_author: String,
    pub old_description: String,
    pub rom_name: String,
    pub rom_crc1: u32,
    pub rom_country: u16,
    pub plugins: PluginNames,
    pub author: String,
    pub description: String,
}

impl Default for MovieHeader {
    fn default() -> Self {
        Self {
            version: VERSION,
            uid: 0,
            length_vis: 0,
            rerecord_count: 0,
            vis_per_second: 60,
            num_controllers: 1,
            extended_version: EXTENDED_VERSION,
            extended_flags: 0,
            length_samples: 0,
            start_flags: start_flags::FROM_NOTHING,
            controller_flags: controller::present(0),
            authorship_tag: AUTHORSHIP_TAG,
            bruteforce_extra_data: 0,
            old_author: String::new(),
            old_description: String::new(),
            rom_name: String::new(),
            rom_crc1: 0,
            rom_country: 0,
            plugins: PluginNames::default(),
            author: String::new(),
            description: String::new(),
        }
    }
}

impl MovieHeader {
    pub fn controller_present(&self, index: usize) -> bool {
        index < 4 && self.controller_flags & controller::present(index) != 0
    }

    pub fn wii_vc(&self) -> bool {
        self.extended_version != 0 && self.extended_flags & EXT_FLAG_WII_VC != 0
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, MovieError> {
        if data.len() < HEADER_SIZE {
            return Err(MovieError::Truncated);
        }
        parse(&mut StateReader::new(&data[..HEADER_SIZE]))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = StateWriter::with_capacity(HEADER_SIZE);
        w.write_u32(MAGIC);
        w.write_u32(self.version);
        w.write_u32(self.uid);
        w.write_u32(self.length_vis);
        w.write_u32(self.rerecord_count as u32);
        w.write_bytes(&[
            self.vis_per_second,
            self.num_controllers,
            self.extended_version,
            self.extended_flags,
        ]);
        w.write_u32(self.length_samples);
        w.write_u16(self.start_flags);
        w.write_u16(0);
        w.write_u32(self.controller_flags);

        w.write_bytes(&self.authorship_tag);
        w.write_u32(self.bruteforce_extra_data);
        w.write_u32((self.rerecord_count >> 32) as u32);
        w.write_exact(&[], EXTENDED_RESERVED_LEN);

        write_str(&mut w, &self.old_author, OLD_AUTHOR_LEN);
        write_str(&mut w, &self.old_description, OLD_DESCRIPTION_LEN);
        write_str(&mut w, &self.rom_name, ROM_NAME_LEN);
        w.write_u32(self.rom_crc1);
        w.write_u16(self.rom_country);
        w.write_exact(&[], RESERVED_LEN);
        write_str(&mut w, &self.plugins.video, PLUGIN_NAME_LEN);
        write_str(&mut w, &self.plugins.audio, PLUGIN_NAME_LEN);
        write_str(&mut w, &self.plugins.input, PLUGIN_NAME_LEN);
        write_str(&mut w, &self.plugins.rsp, PLUGIN_NAME_LEN);
        write_str(&mut w, &self.author, AUTHOR_LEN);
        write_str(&mut w, &self.description, DESCRIPTION_LEN);

        debug_assert_eq!(w.len(), HEADER_SIZE);
        w.into_bytes()
    }
}

fn parse(r: &mut StateReader<'_>) -> Result<MovieHeader, MovieError> {
    if r.read_u32()? != MAGIC {
        return Err(MovieError::BadMagic);
    }
    let version = r.read_u32()?;
    if version != VERSION {
        return Err(MovieError::UnsupportedVersion(version));
    }
    let uid = r.read_u32()?;
    let length_vis = r.read_u32()?;
    let rerecord_low = r.read_u32()?;
    let [vis_per_second, num_controllers, extended_version, extended_flags] = r.read_array()?;
    let length_samples = r.read_u32()?;
    let start_flags = r.read_u16()?;
    r.skip(2)?;
    let controller_flags = r.read_u32()?;

    let authorship_tag = r.read_array()?;
    let bruteforce_extra_data = r.read_u32()?;
    let rerecord_high = r.read_u32()?;
    r.skip(EXTENDED_RESERVED_LEN)?;

    let old_author = read_str(r, OLD_AUTHOR_LEN)?;
    let old_description = read_str(r, OLD_DESCRIPTION_LEN)?;
    let rom_name = read_str(r, ROM_NAME_LEN)?;
    let rom_crc1 = r.read_u32()?;
    let rom_country = r.read_u16()?;
    r.skip(RESERVED_LEN)?;
    let plugins = PluginNames {
        video: read_str(r, PLUGIN_NAME_LEN)?,
        audio: read_str(r, PLUGIN_NAME_LEN)?,
        input: read_str(r, PLUGIN_NAME_LEN)?,
        rsp: read_str(r, PLUGIN_NAME_LEN)?,
    };
    let author = read_str(r, AUTHOR_LEN)?;
    let description = read_str(r, DESCRIPTION_LEN)?;

    // Pre-extension movies left the extended block zeroed or garbage.
    let rerecord_count = if extended_version != 0 {
        (rerecord_high as u64) << 32 | rerecord_low as u64
    } else {
        rerecord_low as u64
    };

    Ok(MovieHeader {
        version,
        uid,
        length_vis,
        rerecord_count,
        vis_per_second,
        num_controllers,
        extended_version,
        extended_flags,
        length_samples,
        start_flags,
        controller_flags,
        authorship_tag,
        bruteforce_extra_data,
        old_author,
        old_description,
        rom_name,
        rom_crc1,
        rom_country,
        plugins,
        author,
        description,
    })
}

/// NUL-terminated fixed field; invalid UTF-8 is replaced, not rejected.
fn read_str(r: &mut StateReader<'_>, len: usize) -> Result<String, crate::savestate::StateError> {
    let raw = r.read_exact(len)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

/// Truncate on a char boundary, always leaving room for the terminator.
fn write_str(w: &mut StateWriter, s: &str, len: usize) {
    let mut end = s.len().min(len - 1);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    w.write_exact(&s.as_bytes()[..end], len);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> MovieHeader {
        MovieHeader {
            uid: 0x6543_2100,
            length_vis: 3600,
            rerecord_count: 0x1_0000_0005,
            length_samples: 1800,
            start_flags: start_flags::FROM_SNAPSHOT,
            controller_flags: controller::present(0) | controller::rumble(0),
            rom_name: "SUPER MARIO 64".to_string(),
            rom_crc1: 0x635A_2BFF,
            rom_country: 0x45,
            plugins: PluginNames {
                video: "GLideN64".to_string(),
                ..PluginNames::default()
            },
            author: "Tëst".to_string(),
            description: "any%".to_string(),
            ..MovieHeader::default()
        }
    }

    #[test]
    fn header_is_1024_bytes_with_fixed_offsets() {
        let bytes = sample_header().to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"M64\x1A");
        assert_eq!(bytes[0x16], EXTENDED_VERSION);
        assert_eq!(&bytes[0x24..0x28], b"MUPN");
        // rerecord high word lives in the extended block.
        assert_eq!(&bytes[0x2C..0x30], &1u32.to_le_bytes());
        assert_eq!(&bytes[0xC4..0xD2], b"SUPER MARIO 64");
        assert_eq!(&bytes[0x122..0x12A], b"GLideN64");
        assert_eq!(&bytes[0x222..0x227], "Tëst".as_bytes());
        assert_eq!(&bytes[0x300..0x304], b"any%");
    }

    #[test]
    fn header_parses_back() {
        let header = sample_header();
        let parsed = MovieHeader::from_bytes(&header.to_bytes()).expect("parse");
        assert_eq!(parsed, header);
        assert!(parsed.controller_present(0));
        assert!(!parsed.controller_present(1));
    }

    #[test]
    fn legacy_header_ignores_extended_rerecords() {
        let mut header = sample_header();
        header.extended_version = 0;
        let parsed = MovieHeader::from_bytes(&header.to_bytes()).expect("parse");
        assert_eq!(parsed.rerecord_count, 5);
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        let mut bytes = sample_header().to_bytes();
        assert!(matches!(
            MovieHeader::from_bytes(&bytes[..100]),
            Err(MovieError::Truncated)
        ));
        bytes[0] = b'X';
        assert!(matches!(
            MovieHeader::from_bytes(&bytes),
            Err(MovieError::BadMagic)
        ));
    }

    #[test]
    fn long_utf8_fields_are_cut_on_char_boundaries() {
        let mut header = sample_header();
        header.author = "é".repeat(200);
        let parsed = MovieHeader::from_bytes(&header.to_bytes()).expect("parse");
        assert_eq!(parsed.author, "é".repeat(110));
    }
}
