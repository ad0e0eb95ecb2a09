use crate::encode::{Decodable, DecodeError, Encodable};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

impl<W> Encodable<W> for u8
where
    W: Write,
{
    fn encode(&self, writer: &mut W) -> Result<(), DecodeError> {
        writer.write_all(&[*self]).map_err(From::from)
    }
}

impl<R> Decodable<u8, R> for u8
where
    R: Read,
{
    fn decode(reader: &mut R) -> Result<u8, DecodeError> {
        let mut buf = [0u8];
        reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl<W> Encodable<W> for u32
where
    W: Write,
{
    fn encode(&self, writer: &mut W) -> Result<(), DecodeError> {
        writer.write_u32::<LittleEndian>(*self).map_err(From::from)
    }
}

impl<R> Decodable<u32, R> for u32
where
    R: Read,
{
    fn decode(reader: &mut R) -> Result<u32, DecodeError> {
        reader.read_u32::<LittleEndian>().map_err(From::from)
    }
}

impl<W> Encodable<W> for u64
where
    W: Write,
{
    fn encode(&self, writer: &mut W) -> Result<(), DecodeError> {
        writer.write_u64::<LittleEndian>(*self).map_err(From::from)
    }
}

impl<R> Decodable<u64, R> for u64
where
    R: Read,
{
    fn decode(reader: &mut R) -> Result<u64, DecodeError> {
        reader.read_u64::<LittleEndian>().map_err(From::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn it_errors_if_not_enough_bytes() {
        let buf = [0u8; 1];
        match u64::decode(&mut &buf[..]) {
            Err(DecodeError::IOError(err)) => assert_eq!(err.kind(), ErrorKind::UnexpectedEof),
            _ => panic!("expected an IO error"),
        }
    }

    #[test]
    fn it_encodes_and_decodes_u32() {
        let val: u32 = 0xFFEEDDCC;
        let mut buf = Vec::new();
        val.encode(&mut buf).unwrap();
        assert_eq!(u32::decode(&mut &buf[..]).unwrap(), val);
    }

    #[test]
    fn it_encodes_and_decodes_u64() {
        let val: u64 = 0xFFEEDDCC_11223344;
        let mut buf = Vec::new();
        val.encode(&mut buf).unwrap();
        assert_eq!(u64::decode(&mut &buf[..]).unwrap(), val);
    }

    #[test]
    fn it_encodes_and_decodes_u8() {
        let val: u8 = 0x7F;
        let mut buf = Vec::new();
        val.encode(&mut buf).unwrap();
        assert_eq!(u8::decode(&mut &buf[..]).unwrap(), val);
    }
}
