//! # GIF Packets
//!
//! Image data of every mipmap and of the CLUT is stored as the GIF packet that
//! uploads it. With transfer headers enabled a packet consists of:
//!
//! - a register list GIFtag (`A+D`, 4 loops)
//! - `BITBLTBUF`, `TRXPOS`, `TRXREG` and `TRXDIR` as (value, register id) pairs
//! - an image GIFtag announcing the data in quad words
//! - the data
//!
//! Without headers only the data is stored.

use crate::registers::{
    BitBltBuf, GifTag, GifTagWord, TrxDir, TrxPos, TrxReg, GIF_MAX_NLOOP, REG_BITBLTBUF,
    REG_TRXDIR, REG_TRXPOS, REG_TRXREG,
};
use rwtxd_api::{Engine, TxdError, TxdResult};
use rwtxd_common::endian::{ByteReader, ByteWriter};

/// Bytes added in front of the data by the transfer headers.
pub const HEADER_OVERHEAD: usize = 96;

/// Transfer registers of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferHeader {
    /// Destination buffer.
    pub bitbltbuf: BitBltBuf,
    /// Destination position.
    pub trxpos: TrxPos,
    /// Transfer area.
    pub trxreg: TrxReg,
    /// Direction.
    pub trxdir: TrxDir,
}

impl TransferHeader {
    /// Header of a host to local upload of a `width` x `height` area.
    pub fn upload(base_pointer: u32, buffer_width: u32, psm: u64, width: u32, height: u32) -> Self {
        let mut header = Self::default();
        header.bitbltbuf.set_dbp(base_pointer as u64);
        header.bitbltbuf.set_dbw(buffer_width as u64);
        header.bitbltbuf.set_dpsm(psm);
        header.trxreg.set_rrw(width as u64);
        header.trxreg.set_rrh(height as u64);
        header
    }

    /// Transfer area, as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.trxreg.rrw() as u32, self.trxreg.rrh() as u32)
    }
}

/// One upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsPacket {
    /// Transfer registers, if stored.
    pub header: Option<TransferHeader>,
    /// Uploaded bytes.
    pub data: Vec<u8>,
}

impl GsPacket {
    /// Size on disk.
    pub fn stored_size(&self) -> usize {
        self.data.len() + if self.header.is_some() { HEADER_OVERHEAD } else { 0 }
    }

    /// Appends the packet to `writer`.
    ///
    /// # Errors
    ///
    /// [`TxdError::Structural`] when the data does not fit into one image GIFtag.
    pub fn write(&self, writer: &mut ByteWriter) -> TxdResult<()> {
        if let Some(header) = &self.header {
            if self.data.len() % 16 != 0 {
                return Err(TxdError::structural(format!(
                    "GS upload of {} bytes is not quad word aligned",
                    self.data.len()
                )));
            }
            let quad_words = (self.data.len() / 16) as u64;
            if quad_words >= GIF_MAX_NLOOP {
                return Err(TxdError::structural(format!(
                    "GS upload of {} bytes exceeds one GIF packet",
                    self.data.len()
                )));
            }

            write_tag(writer, GifTag::register_list(4));
            for (value, register) in [
                (u64::from(header.bitbltbuf), REG_BITBLTBUF),
                (u64::from(header.trxpos), REG_TRXPOS),
                (u64::from(header.trxreg), REG_TRXREG),
                (u64::from(header.trxdir), REG_TRXDIR),
            ] {
                writer.put_u64(value);
                writer.put_u64(register);
            }
            write_tag(writer, GifTag::image(quad_words));
        }
        writer.put_bytes(&self.data);
        Ok(())
    }

    /// Reads one packet.
    ///
    /// `size` is the data size to read when the packet carries no headers.
    pub fn read(engine: &Engine, reader: &mut ByteReader<'_>, with_header: bool, size: usize) -> TxdResult<Self> {
        if !with_header {
            let data = reader.read_bytes(size).ok_or_else(|| truncated(size))?;
            return Ok(Self {
                header: None,
                data: data.to_vec(),
            });
        }

        let list = read_tag(reader)?;
        if !list.is_register_list() {
            return Err(TxdError::structural("GS packet does not start with an A+D register list"));
        }
        let mut header = TransferHeader::default();
        for _ in 0..list.tag.nloop() {
            let value = reader.read_u64().ok_or_else(|| truncated(16))?;
            let register = reader.read_u64().ok_or_else(|| truncated(8))?;
            match register {
                REG_BITBLTBUF => header.bitbltbuf = BitBltBuf::from(value),
                REG_TRXPOS => header.trxpos = TrxPos::from(value),
                REG_TRXREG => header.trxreg = TrxReg::from(value),
                REG_TRXDIR => header.trxdir = TrxDir::from(value),
                other => engine.push_warning(3, format!("unexpected GS register {other:#x} in texture upload")),
            }
        }
        if header.trxdir.xdir() != 0 {
            return Err(TxdError::structural("GS upload is not a host to local transfer"));
        }

        let image = read_tag(reader)?;
        if !image.is_image() {
            return Err(TxdError::structural("GS packet is missing its image GIFtag"));
        }
        let length = image.tag.nloop() as usize * 16;
        let data = reader.read_bytes(length).ok_or_else(|| truncated(length))?;
        Ok(Self {
            header: Some(header),
            data: data.to_vec(),
        })
    }
}

fn write_tag(writer: &mut ByteWriter, tag: GifTag) {
    writer.put_u64(tag.tag.into());
    writer.put_u64(tag.registers);
}

fn read_tag(reader: &mut ByteReader<'_>) -> TxdResult<GifTag> {
    let tag = reader.read_u64().ok_or_else(|| truncated(GifTag::SIZE))?;
    let registers = reader.read_u64().ok_or_else(|| truncated(8))?;
    Ok(GifTag {
        tag: GifTagWord::from(tag),
        registers,
    })
}

fn truncated(needed: usize) -> TxdError {
    TxdError::structural(format!("GS packet data ends {needed} bytes early"))
}
