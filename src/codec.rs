//! Binary codec for n-dimensional numeric arrays.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! 0      4     5      6     7         8          8+8r
//! | NDAR | ver | dtype | rank | reserved | dims u64 × r | elements (row-major) |
//! ```
//!
//! Decoding only ever reads plain numbers: there is no type registry and no
//! object graph, so a hostile payload can at worst be rejected.

use ndarray::{ArrayD, IxDyn};
use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"NDAR";
pub const FORMAT_VERSION: u8 = 1;
pub const MAX_RANK: usize = 32;
const HEADER_LEN: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload too short: need {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },

    #[error("bad magic bytes {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown dtype tag {0}")]
    UnknownDType(u8),

    #[error("rank {0} exceeds maximum of {MAX_RANK}")]
    RankTooLarge(usize),

    #[error("reserved header byte must be zero, got {0}")]
    ReservedByte(u8),

    #[error("dimensions overflow addressable size")]
    DimensionOverflow,

    #[error("element data length mismatch: expected {expected} bytes, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("shape error: {0}")]
    Shape(String),
}

/// Element type stored in the payload header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    pub fn tag(self) -> u8 {
        match self {
            DType::U8 => 1,
            DType::I32 => 2,
            DType::I64 => 3,
            DType::F32 => 4,
            DType::F64 => 5,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            1 => Ok(DType::U8),
            2 => Ok(DType::I32),
            3 => Ok(DType::I64),
            4 => Ok(DType::F32),
            5 => Ok(DType::F64),
            other => Err(CodecError::UnknownDType(other)),
        }
    }

    pub fn size(self) -> usize {
        match self {
            DType::U8 => 1,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::U8 => "uint8",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

trait Element: Copy {
    const DTYPE: DType;
    fn write_le(self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }
        }
    };
}

impl_element!(u8, DType::U8);
impl_element!(i32, DType::I32);
impl_element!(i64, DType::I64);
// Float `to_le_bytes` is the raw IEEE-754 bit pattern, so NaN payloads and -0.0 survive.
impl_element!(f32, DType::F32);
impl_element!(f64, DType::F64);

/// A dynamically-shaped array of one of the supported element types
#[derive(Debug, Clone, PartialEq)]
pub enum NdArray {
    U8(ArrayD<u8>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

macro_rules! impl_from_array {
    ($ty:ty, $variant:ident) => {
        impl From<ArrayD<$ty>> for NdArray {
            fn from(array: ArrayD<$ty>) -> Self {
                NdArray::$variant(array)
            }
        }
    };
}

impl_from_array!(u8, U8);
impl_from_array!(i32, I32);
impl_from_array!(i64, I64);
impl_from_array!(f32, F32);
impl_from_array!(f64, F64);

impl NdArray {
    pub fn dtype(&self) -> DType {
        match self {
            NdArray::U8(_) => DType::U8,
            NdArray::I32(_) => DType::I32,
            NdArray::I64(_) => DType::I64,
            NdArray::F32(_) => DType::F32,
            NdArray::F64(_) => DType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            NdArray::U8(a) => a.shape(),
            NdArray::I32(a) => a.shape(),
            NdArray::I64(a) => a.shape(),
            NdArray::F32(a) => a.shape(),
            NdArray::F64(a) => a.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            NdArray::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_f32(self) -> Option<ArrayD<f32>> {
        match self {
            NdArray::F32(a) => Some(a),
            _ => None,
        }
    }

    /// Equality on dtype, shape and element bit patterns.
    ///
    /// Unlike `==`, a NaN compares equal to an identical NaN.
    pub fn bits_eq(&self, other: &NdArray) -> bool {
        self.dtype() == other.dtype()
            && self.shape() == other.shape()
            && element_bytes(self) == element_bytes(other)
    }
}

fn write_elements<T: Element>(array: &ArrayD<T>, out: &mut Vec<u8>) {
    // `iter` walks in logical row-major order regardless of memory layout.
    for value in array.iter() {
        value.write_le(out);
    }
}

fn element_bytes(array: &NdArray) -> Vec<u8> {
    let mut out = Vec::with_capacity(array.len() * array.dtype().size());
    match array {
        NdArray::U8(a) => write_elements(a, &mut out),
        NdArray::I32(a) => write_elements(a, &mut out),
        NdArray::I64(a) => write_elements(a, &mut out),
        NdArray::F32(a) => write_elements(a, &mut out),
        NdArray::F64(a) => write_elements(a, &mut out),
    }
    out
}

/// Encode an array into the self-describing binary layout.
///
/// Arrays with more than [`MAX_RANK`] axes are rejected, since [`decode`] would refuse them.
pub fn encode(array: &NdArray) -> Result<Vec<u8>, CodecError> {
    let shape = array.shape();
    if shape.len() > MAX_RANK {
        return Err(CodecError::RankTooLarge(shape.len()));
    }

    let elements = element_bytes(array);
    let mut out = Vec::with_capacity(HEADER_LEN + shape.len() * 8 + elements.len());
    out.extend_from_slice(&MAGIC);
    out.push(FORMAT_VERSION);
    out.push(array.dtype().tag());
    out.push(shape.len() as u8);
    out.push(0);
    for dim in shape {
        out.extend_from_slice(&(*dim as u64).to_le_bytes());
    }
    out.extend_from_slice(&elements);
    Ok(out)
}

fn read_elements<T: Element>(dims: &[usize], data: &[u8]) -> Result<ArrayD<T>, CodecError> {
    let size = T::DTYPE.size();
    let values: Vec<T> = data.chunks_exact(size).map(T::read_le).collect();
    ArrayD::from_shape_vec(IxDyn(dims), values).map_err(|e| CodecError::Shape(e.to_string()))
}

/// Decode bytes produced by [`encode`]
pub fn decode(bytes: &[u8]) -> Result<NdArray, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::TooShort {
            needed: HEADER_LEN,
            got: bytes.len(),
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[0..4]);
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(bytes[4]));
    }
    let dtype = DType::from_tag(bytes[5])?;
    let rank = bytes[6] as usize;
    if rank > MAX_RANK {
        return Err(CodecError::RankTooLarge(rank));
    }
    if bytes[7] != 0 {
        return Err(CodecError::ReservedByte(bytes[7]));
    }

    let data_start = HEADER_LEN + rank * 8;
    if bytes.len() < data_start {
        return Err(CodecError::TooShort {
            needed: data_start,
            got: bytes.len(),
        });
    }

    let mut dims = Vec::with_capacity(rank);
    let mut count: usize = 1;
    for chunk in bytes[HEADER_LEN..data_start].chunks_exact(8) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        let dim = usize::try_from(u64::from_le_bytes(buf))
            .map_err(|_| CodecError::DimensionOverflow)?;
        count = count
            .checked_mul(dim)
            .ok_or(CodecError::DimensionOverflow)?;
        dims.push(dim);
    }
    let expected = count
        .checked_mul(dtype.size())
        .ok_or(CodecError::DimensionOverflow)?;

    let data = &bytes[data_start..];
    if data.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            got: data.len(),
        });
    }

    Ok(match dtype {
        DType::U8 => NdArray::U8(read_elements(&dims, data)?),
        DType::I32 => NdArray::I32(read_elements(&dims, data)?),
        DType::I64 => NdArray::I64(read_elements(&dims, data)?),
        DType::F32 => NdArray::F32(read_elements(&dims, data)?),
        DType::F64 => NdArray::F64(read_elements(&dims, data)?),
    })
}
