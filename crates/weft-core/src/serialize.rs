// Binary tensor serialization
//
// Layout of the byte stream:
//
//   ┌──────────────┬──────────────────────┬───────────────────────┐
//   │ 8 bytes      │ N bytes              │ raw element bytes     │
//   │ header size  │ JSON header (UTF-8)  │ (full storage, LE)    │
//   │ (u64 LE)     │                      │                       │
//   └──────────────┴──────────────────────┴───────────────────────┘
//
// JSON header example:
//   {
//     "dtype": "f64",
//     "order": "row_major",
//     "shape": [2, 3],
//     "stride": [3, 1],
//     "dim_index": [0, 1],
//     "offset": [0, 0],
//     "fixed_dims": [-1, -1]
//   }
//
// The whole storage buffer is written, not just the visible window, so
// sliced and transposed views reconstruct exactly: the header carries every
// layout table and `deserialize` rebuilds the same view over an identical
// buffer.
//
// Deserialization is input-derived, so it never panics on malformed bytes;
// every failure path returns `None`.

use crate::dtype::{DType, Element};
use crate::extent::Extent;
use crate::storage::{DimensionOrder, Storage};
use crate::tensor::Tensor;

fn order_tag(order: DimensionOrder) -> &'static str {
    match order {
        DimensionOrder::RowMajor => "row_major",
        DimensionOrder::ColumnMajor => "column_major",
    }
}

fn elems_to_bytes<E: Element>(data: &[E]) -> Vec<u8> {
    match E::DTYPE {
        DType::F32 => data
            .iter()
            .flat_map(|&v| (v.to_f64() as f32).to_le_bytes())
            .collect(),
        DType::F64 => data.iter().flat_map(|&v| v.to_f64().to_le_bytes()).collect(),
        DType::I32 => data
            .iter()
            .flat_map(|&v| (v.to_f64() as i32).to_le_bytes())
            .collect(),
    }
}

fn elems_from_bytes<E: Element>(raw: &[u8]) -> Option<Vec<E>> {
    if raw.len() % E::DTYPE.size_in_bytes() != 0 {
        return None;
    }
    Some(match E::DTYPE {
        DType::F32 => raw
            .chunks_exact(4)
            .map(|c| E::from_f64(f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64))
            .collect(),
        DType::F64 => raw
            .chunks_exact(8)
            .map(|c| {
                E::from_f64(f64::from_le_bytes([
                    c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7],
                ]))
            })
            .collect(),
        DType::I32 => raw
            .chunks_exact(4)
            .map(|c| E::from_f64(i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64))
            .collect(),
    })
}

/// Serialize a tensor, view tables and all, to a byte vector.
pub fn serialize<S: Storage>(tensor: &Tensor<S>) -> Vec<u8> {
    let header = serde_json::json!({
        "dtype": S::Elem::DTYPE.to_string(),
        "order": order_tag(S::ORDER),
        "shape": tensor.shape().dims(),
        "stride": tensor.stride(),
        "dim_index": tensor.dim_index(),
        "offset": tensor.view_offset(),
        "fixed_dims": tensor.fixed_dims(),
    });
    let header_bytes = header.to_string().into_bytes();
    let data = tensor.with_storage(|s| elems_to_bytes(s.data()));

    let mut out = Vec::with_capacity(8 + header_bytes.len() + data.len());
    out.extend_from_slice(&(header_bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&data);
    out
}

fn usize_list(v: &serde_json::Value) -> Option<Vec<usize>> {
    v.as_array()?
        .iter()
        .map(|x| x.as_u64().map(|u| u as usize))
        .collect()
}

fn isize_list(v: &serde_json::Value) -> Option<Vec<isize>> {
    v.as_array()?
        .iter()
        .map(|x| x.as_i64().map(|i| i as isize))
        .collect()
}

/// Reconstruct a tensor serialized with [`serialize`]. The byte stream must
/// have been produced for the same element type and storage order; any
/// malformed, truncated, or mismatched input yields `None`.
pub fn deserialize<S: Storage>(bytes: &[u8]) -> Option<Tensor<S>> {
    let size_bytes: [u8; 8] = bytes.get(0..8)?.try_into().ok()?;
    let header_len = u64::from_le_bytes(size_bytes) as usize;
    let rest = bytes.get(8..)?;
    if rest.len() < header_len {
        return None;
    }

    let header: serde_json::Value = serde_json::from_slice(&rest[..header_len]).ok()?;
    if header.get("dtype")?.as_str()? != S::Elem::DTYPE.to_string() {
        return None;
    }
    if header.get("order")?.as_str()? != order_tag(S::ORDER) {
        return None;
    }
    let shape = Extent::new(usize_list(header.get("shape")?)?);
    let stride = usize_list(header.get("stride")?)?;
    let dim_index = usize_list(header.get("dim_index")?)?;
    let offset = usize_list(header.get("offset")?)?;
    let fixed_dims = isize_list(header.get("fixed_dims")?)?;

    let data = elems_from_bytes::<S::Elem>(&rest[header_len..])?;
    let storage = S::from_slice(&data);
    // from_parts validates the layout, including storage bounds
    Tensor::from_parts(storage, shape, offset, dim_index, stride, fixed_dims).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::is_close;
    use crate::storage::{BlasStorage, NativeStorage};

    type T = Tensor<NativeStorage<f64>>;
    type FT = Tensor<NativeStorage<f32>>;
    type BT = Tensor<BlasStorage<f64>>;

    #[test]
    fn test_roundtrip_contiguous() {
        let t = T::from_rows(&[vec![1.5, 2.5, 3.5], vec![4.5, 5.5, 6.5]]).unwrap();
        let restored: T = deserialize(&serialize(&t)).unwrap();
        assert_eq!(restored.shape(), t.shape());
        assert!(is_close(&t, &restored, 1e-8));
    }

    #[test]
    fn test_roundtrip_blas_backend() {
        let t = BT::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let restored: BT = deserialize(&serialize(&t)).unwrap();
        assert!(is_close(&t, &restored, 1e-8));
    }

    #[test]
    fn test_roundtrip_windowed_view() {
        let t = T::from_rows(&[
            vec![0.0, 1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0, 7.0],
            vec![8.0, 9.0, 10.0, 11.0],
        ])
        .unwrap();
        let w = t.window(&[(1..3).into(), (1..4).into()]).unwrap();
        let restored: T = deserialize(&serialize(&w)).unwrap();
        assert_eq!(restored.shape(), w.shape());
        assert!(is_close(&w, &restored, 1e-8));
    }

    #[test]
    fn test_roundtrip_transposed_view() {
        let t = T::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let tt = t.transpose();
        let restored: T = deserialize(&serialize(&tt)).unwrap();
        assert!(is_close(&tt, &restored, 1e-8));
    }

    #[test]
    fn test_roundtrip_f32() {
        let t = FT::vector(&[1.25, -2.5, 3.75]);
        let restored: FT = deserialize(&serialize(&t)).unwrap();
        assert!(is_close(&t, &restored, 1e-8));
    }

    #[test]
    fn test_dtype_mismatch_is_none() {
        let t = FT::vector(&[1.0, 2.0]);
        assert!(deserialize::<NativeStorage<f64>>(&serialize(&t)).is_none());
    }

    #[test]
    fn test_order_mismatch_is_none() {
        let t = T::vector(&[1.0, 2.0]);
        assert!(deserialize::<BlasStorage<f64>>(&serialize(&t)).is_none());
    }

    #[test]
    fn test_malformed_inputs_are_none() {
        assert!(deserialize::<NativeStorage<f64>>(&[]).is_none());
        assert!(deserialize::<NativeStorage<f64>>(&[1, 2, 3]).is_none());

        // header length pointing past the end
        let mut bytes = 1000u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(deserialize::<NativeStorage<f64>>(&bytes).is_none());

        // valid length prefix, invalid JSON
        let garbage = b"not json at all";
        let mut bytes = (garbage.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(garbage);
        assert!(deserialize::<NativeStorage<f64>>(&bytes).is_none());
    }

    #[test]
    fn test_truncated_data_is_none() {
        let t = T::vector(&[1.0, 2.0, 3.0]);
        let bytes = serialize(&t);
        // drop part of the trailing element bytes
        assert!(deserialize::<NativeStorage<f64>>(&bytes[..bytes.len() - 4]).is_none());
    }

    #[test]
    fn test_missing_data_is_none() {
        let t = T::vector(&[1.0, 2.0, 3.0]);
        let bytes = serialize(&t);
        // keep the header, drop all element bytes
        assert!(deserialize::<NativeStorage<f64>>(&bytes[..bytes.len() - 24]).is_none());
    }
}
