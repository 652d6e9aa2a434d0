
use std::io::{Read, Write};

use crate::RagError;

const MAGIC: &[u8; 8] = b"LRAGFLAT";
const FORMAT_VERSION: u32 = 1;

/// Exact nearest-neighbour index over a dense row-major matrix
///
/// Rows are searched by brute force using squared Euclidean distance. Row `i`
/// is the `i`-th vector added.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

impl FlatIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a row
    #[inline]
    pub fn add(&mut self, vector: &[f32]) -> Result<(), RagError> {
        self.check_dimension(vector)?;
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Return the `k` rows nearest to `query`, nearest first
    ///
    /// Equal distances are ordered by row. Fewer than `k` neighbours are
    /// returned when the index holds fewer than `k` rows.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, RagError> {
        self.check_dimension(query)?;

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| Neighbor {
                row,
                distance: squared_l2(query, vector),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.row.cmp(&b.row))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    /// Serialize as a little-endian binary blob
    #[inline]
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), RagError> {
        let dimension = u32::try_from(self.dimension)
            .map_err(|_| RagError::Index(format!("Dimension {} too large", self.dimension)))?;
        let rows = u64::try_from(self.len())
            .map_err(|_| RagError::Index("Too many rows to serialize".to_string()))?;

        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&dimension.to_le_bytes())?;
        writer.write_all(&rows.to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read an index previously written with [`FlatIndex::write_to`]
    #[inline]
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, RagError> {
        let mut magic = [0u8; 8];
        read_exact(&mut reader, &mut magic)?;
        if &magic != MAGIC {
            return Err(RagError::Index("Not a flat index file".to_string()));
        }

        let version = u32::from_le_bytes(read_array(&mut reader)?);
        if version != FORMAT_VERSION {
            return Err(RagError::Index(format!(
                "Unsupported index format version {}",
                version
            )));
        }

        let dimension = usize::try_from(u32::from_le_bytes(read_array(&mut reader)?))
            .map_err(|_| RagError::Index("Dimension does not fit in memory".to_string()))?;
        let rows = usize::try_from(u64::from_le_bytes(read_array(&mut reader)?))
            .map_err(|_| RagError::Index("Row count does not fit in memory".to_string()))?;

        if dimension == 0 && rows > 0 {
            return Err(RagError::Index(
                "Index with rows must have a non-zero dimension".to_string(),
            ));
        }

        let expected_bytes = rows
            .checked_mul(dimension)
            .and_then(|values| values.checked_mul(size_of::<f32>()))
            .ok_or_else(|| {
                RagError::Index(format!(
                    "Index header claims {} rows of dimension {}, which overflows",
                    rows, dimension
                ))
            })?;

        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() != expected_bytes {
            return Err(RagError::Index(format!(
                "Index body has {} bytes, expected {}",
                bytes.len(),
                expected_bytes
            )));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self { dimension, data })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), RagError> {
        if vector.len() != self.dimension || self.dimension == 0 {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), RagError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            RagError::Index("Index file is truncated".to_string())
        } else {
            RagError::Io(e)
        }
    })
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], RagError> {
    let mut buf = [0u8; N];
    read_exact(reader, &mut buf)?;
    Ok(buf)
}
