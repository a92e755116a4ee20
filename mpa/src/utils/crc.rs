//! CRC validation for protected MPEG audio frames.
//!
//! Frames with the protection bit cleared carry a 16-bit CRC right after the
//! header. For Layer I it covers the last two header bytes followed by the
//! bit allocation field, which is not always a whole number of bytes, so the
//! checksum can also be advanced bit by bit.

/// CRC algorithm parameters: polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16 used by ISO/IEC 11172-3 and 13818-3 (x^16 + x^15 + x^2 + 1).
pub const CRC_MPEG_AUDIO_ALG: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0xffff,
};

/// Shifts the top byte of `value` through the polynomial, MSB first.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, len: usize) -> u16 {
    value <<= 8;

    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
        i += 1;
    }

    value
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, i as u16, 8);
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = self.table_entry((crc >> 8) ^ bytes[i] as u16) ^ (crc << 8);
            i += 1;
        }

        crc
    }

    /// Feeds the low `len` bits of `value`, most significant first.
    #[inline(always)]
    pub const fn update_bits(&self, mut crc: u16, value: u32, len: u32) -> u16 {
        let mut i = len;

        while i > 0 {
            i -= 1;
            let bit = ((value >> i) & 1) as u16;
            let top = (crc >> 15) & 1;
            crc = (crc << 1) ^ ((top ^ bit) * self.poly);
        }

        crc
    }

    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new(&CRC_MPEG_AUDIO_ALG)
    }
}

#[test]
fn mpeg_audio_check_value() {
    let crc = Crc16::default();
    assert_eq!(crc.checksum(b"123456789"), 0xAEE7);
}

#[test]
fn bitwise_update_matches_bytewise() {
    let crc = Crc16::default();
    let data = [0x40u8, 0xC4, 0x30, 0x00, 0x7E];

    let bytewise = crc.update(crc.init, &data);
    let bitwise = data
        .iter()
        .fold(crc.init, |acc, &byte| crc.update_bits(acc, byte as u32, 8));
    assert_eq!(bytewise, bitwise);

    let nibbles = data.iter().fold(crc.init, |acc, &byte| {
        let acc = crc.update_bits(acc, (byte >> 4) as u32, 4);
        crc.update_bits(acc, (byte & 0x0F) as u32, 4)
    });
    assert_eq!(bytewise, nibbles);
}
