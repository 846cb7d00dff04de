//! Variable-length integer coding shared by postings and document vectors

use std::io::{self, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Write a variable-length integer (7 bits per byte, little-endian groups)
pub fn write_vint<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            writer.write_u8(byte)?;
            break;
        } else {
            writer.write_u8(byte | 0x80)?;
        }
    }
    Ok(())
}

/// Read a variable-length integer, failing on truncated or oversized input
pub fn read_vint(reader: &mut &[u8]) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;
    loop {
        let byte = reader
            .read_u8()
            .map_err(|_| Error::Decode("truncated variable-length integer".to_string()))?;
        if shift >= 64 {
            return Err(Error::Decode("variable-length integer overflow".to_string()));
        }
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

/// Read a variable-length integer that must fit in a u32
pub fn read_vint_u32(reader: &mut &[u8]) -> Result<u32> {
    let value = read_vint(reader)?;
    u32::try_from(value)
        .map_err(|_| Error::Decode(format!("value {} does not fit in 32 bits", value)))
}
