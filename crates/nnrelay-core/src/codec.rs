//! Conversion between wire tensors (dtype code + raw little-endian bytes)
//! and typed [`TensorData`].
//!
//! Wire dtype codes:
//!
//! | code       | element |
//! |------------|---------|
//! | 0          | i8 (boolean-like) |
//! | 1, 2       | f16     |
//! | 3          | f32     |
//! | 4          | f64     |
//! | 5, 6       | i8      |
//! | 7          | i16     |
//! | 8          | i32     |
//! | 9          | i64     |
//! | 10, 11, 12 | u8      |
//! | 13         | u16     |
//! | 14         | u32     |
//! | 15         | u64     |
//!
//! Any other code decodes as f32. Shapes ride along as metadata and are not
//! checked against the buffer length here.

use bytes::{BufMut, Bytes, BytesMut};
use half::f16;
use thiserror::Error;

use crate::{DType, IOName, NamedTensor, Shape, TensorData};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("{len} byte buffer is not a whole number of {dtype} elements")]
    Misaligned { dtype: DType, len: usize },
    #[error("tensor {node} has negative dimension {dim}")]
    NegativeDim { node: String, dim: i64 },
}

/// A tensor as carried on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct WireTensor {
    pub node_name: String,
    pub shape: Vec<i64>,
    pub dtype: i32,
    pub data: Bytes,
}

pub fn dtype_for_code(code: i32) -> DType {
    match code {
        0 => DType::I8,
        1 | 2 => DType::F16,
        3 => DType::F32,
        4 => DType::F64,
        5 | 6 => DType::I8,
        7 => DType::I16,
        8 => DType::I32,
        9 => DType::I64,
        10..=12 => DType::U8,
        13 => DType::U16,
        14 => DType::U32,
        15 => DType::U64,
        _ => DType::F32,
    }
}

/// Code written on outgoing tensors for each element type.
pub fn code_for_dtype(dtype: DType) -> i32 {
    match dtype {
        DType::F16 => 1,
        DType::F32 => 3,
        DType::F64 => 4,
        DType::I8 => 5,
        DType::I16 => 7,
        DType::I32 => 8,
        DType::I64 => 9,
        DType::U8 => 10,
        DType::U16 => 13,
        DType::U32 => 14,
        DType::U64 => 15,
    }
}

macro_rules! from_le {
    ($bytes:expr, $ty:ty) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|c| {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(c);
                <$ty>::from_le_bytes(raw)
            })
            .collect()
    };
}

pub fn decode(code: i32, bytes: &[u8]) -> Result<TensorData, CodecError> {
    let dtype = dtype_for_code(code);
    if bytes.len() % dtype.size_of() != 0 {
        return Err(CodecError::Misaligned {
            dtype,
            len: bytes.len(),
        });
    }

    Ok(match dtype {
        DType::I8 => TensorData::I8(from_le!(bytes, i8)),
        DType::F16 => TensorData::F16(from_le!(bytes, f16)),
        DType::F32 => TensorData::F32(from_le!(bytes, f32)),
        DType::F64 => TensorData::F64(from_le!(bytes, f64)),
        DType::I16 => TensorData::I16(from_le!(bytes, i16)),
        DType::I32 => TensorData::I32(from_le!(bytes, i32)),
        DType::I64 => TensorData::I64(from_le!(bytes, i64)),
        DType::U8 => TensorData::U8(bytes.to_vec()),
        DType::U16 => TensorData::U16(from_le!(bytes, u16)),
        DType::U32 => TensorData::U32(from_le!(bytes, u32)),
        DType::U64 => TensorData::U64(from_le!(bytes, u64)),
    })
}

macro_rules! put_le {
    ($out:expr, $values:expr) => {
        for v in $values {
            $out.put_slice(&v.to_le_bytes());
        }
    };
}

pub fn encode(data: &TensorData) -> Bytes {
    let mut out = BytesMut::with_capacity(data.byte_len());
    match data {
        TensorData::I8(v) => put_le!(out, v),
        TensorData::F16(v) => put_le!(out, v),
        TensorData::F32(v) => put_le!(out, v),
        TensorData::F64(v) => put_le!(out, v),
        TensorData::I16(v) => put_le!(out, v),
        TensorData::I32(v) => put_le!(out, v),
        TensorData::I64(v) => put_le!(out, v),
        TensorData::U8(v) => out.put_slice(v),
        TensorData::U16(v) => put_le!(out, v),
        TensorData::U32(v) => put_le!(out, v),
        TensorData::U64(v) => put_le!(out, v),
    }
    out.freeze()
}

/// Dimensions are carried as given except that a negative one is rejected;
/// element count against shape is left to the engine.
pub fn decode_tensor(tensor: &WireTensor) -> Result<NamedTensor, CodecError> {
    let shape = tensor
        .shape
        .iter()
        .map(|&dim| {
            usize::try_from(dim).map_err(|_| CodecError::NegativeDim {
                node: tensor.node_name.clone(),
                dim,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let data = decode(tensor.dtype, &tensor.data)?;

    Ok(NamedTensor {
        name: IOName(tensor.node_name.clone()),
        shape: Shape::from_slice(&shape),
        data,
    })
}

pub fn encode_tensor(tensor: &NamedTensor) -> WireTensor {
    WireTensor {
        node_name: tensor.name.0.clone(),
        shape: tensor.shape.dims().iter().map(|d| *d as i64).collect(),
        dtype: code_for_dtype(tensor.data.dtype()),
        data: encode(&tensor.data),
    }
}
