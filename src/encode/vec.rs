use crate::encode::{Decodable, DecodeError, Encodable};
use std::io::{Read, Write};

// The wire format's every length-prefixed field uses a 4-byte int count,
// so this ceiling just guards against a corrupt image claiming something
// absurd rather than against a real limit on sketch size.
const MAX_VEC_LEN: u32 = 256_000_000;

macro_rules! build_encodable_vec_type {
    ($type:ty) => {
        impl<W> Encodable<W> for Vec<$type>
        where
            W: Write,
        {
            fn encode(&self, writer: &mut W) -> Result<(), DecodeError> {
                let len = self.len();
                if len as u64 > MAX_VEC_LEN as u64 {
                    return Err(DecodeError::LengthTooLong(len));
                }

                (len as u32).encode(writer)?;
                for v in self.iter() {
                    v.encode(writer)?;
                }
                Ok(())
            }
        }

        impl<R> Decodable<Vec<$type>, R> for Vec<$type>
        where
            R: Read,
        {
            fn decode(reader: &mut R) -> Result<Vec<$type>, DecodeError> {
                let len = u32::decode(reader)?;
                if len > MAX_VEC_LEN {
                    return Err(DecodeError::LengthTooLong(len as usize));
                }

                let mut result = Vec::<$type>::with_capacity(len as usize);
                for _ in 0..len {
                    let v = <$type>::decode(reader)?;
                    result.push(v);
                }
                Ok(result)
            }
        }
    };
}

build_encodable_vec_type!(f32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_encodes_and_decodes_empty_f32_vec() {
        let mut buf = Vec::new();
        let data: Vec<f32> = vec![];
        data.encode(&mut buf)
            .expect("could not encode empty Vec<f32>");
        let decoded = Vec::<f32>::decode(&mut &buf[..]).expect("could not decode empty Vec<f32>");
        assert_eq!(decoded.len(), 0);
    }

    #[test]
    fn it_encodes_and_decodes_f32_vec() {
        let mut buf = Vec::new();
        let data = vec![1.0f32, -2.5f32, 3.0f32];
        data.encode(&mut buf).expect("could not encode Vec<f32>");
        let decoded = Vec::<f32>::decode(&mut &buf[..]).expect("could not decode Vec<f32>");
        assert_eq!(data, decoded);
    }
}
