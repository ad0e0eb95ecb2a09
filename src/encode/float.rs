use crate::encode::{Decodable, DecodeError, Encodable};
use std::io::{Read, Write};

macro_rules! build_encodable_float_type {
    ($ftype:ty, $itype:ty) => {
        impl<W> Encodable<W> for $ftype
        where
            W: Write,
        {
            fn encode(&self, writer: &mut W) -> Result<(), DecodeError> {
                self.to_bits().encode(writer)
            }
        }

        impl<R> Decodable<$ftype, R> for $ftype
        where
            R: Read,
        {
            fn decode(reader: &mut R) -> Result<$ftype, DecodeError> {
                let encoded_int = <$itype>::decode(reader)?;
                Ok(<$ftype>::from_bits(encoded_int))
            }
        }
    };
}

build_encodable_float_type!(f32, u32);
