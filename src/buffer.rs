/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Packing between typed element slices and byte buffers. Truncation is
//! deterministic and element-granular: only whole elements are copied, and
//! running out of source or destination stops the copy without error.

use crate::datatype::Element;
use crate::error::Error;
use crate::error::Result;

/// Pack up to `count` elements of `src` starting at `offset` into `dst` at
/// `position`. Only whole elements that fit are written. Returns the
/// position just past the last byte written.
pub fn pack<T: Element>(
    src: &[T],
    offset: usize,
    count: usize,
    dst: &mut [u8],
    position: usize,
) -> Result<usize> {
    if position > dst.len() {
        return Err(Error::InvalidArgument(format!(
            "pack position {} beyond buffer of {} bytes",
            position,
            dst.len()
        )));
    }
    let count = count.min(src.len().saturating_sub(offset));
    let mut encoded = Vec::new();
    let mut bounds = Vec::with_capacity(count);
    for element in &src[offset..offset + count] {
        element.put(&mut encoded);
        bounds.push(encoded.len());
    }
    let space = dst.len() - position;
    let fit = bounds.iter().take_while(|&&end| end <= space).count();
    let nbytes = if fit == 0 { 0 } else { bounds[fit - 1] };
    dst[position..position + nbytes].copy_from_slice(&encoded[..nbytes]);
    Ok(position + nbytes)
}

/// Pack `count` elements of `src` starting at `offset` into a fresh buffer.
pub fn pack_alloc<T: Element>(src: &[T], offset: usize, count: usize) -> Result<Vec<u8>> {
    let count = count.min(src.len().saturating_sub(offset));
    let mut encoded = Vec::new();
    for element in &src[offset..offset + count] {
        element.put(&mut encoded);
    }
    Ok(encoded)
}

/// Unpack up to `count` elements from `src` at `position` into `dst`
/// starting at `offset`. Stops without error when either side runs out of
/// whole elements. Returns the position just past the last byte consumed.
pub fn unpack<T: Element>(
    src: &[u8],
    position: usize,
    dst: &mut [T],
    offset: usize,
    count: usize,
) -> Result<usize> {
    let count = count.min(dst.len().saturating_sub(offset));
    let mut pos = position;
    for i in 0..count {
        let mut attempt = pos;
        match T::take(src, &mut attempt) {
            Ok(value) => {
                dst[offset + i] = value;
                pos = attempt;
            }
            Err(Error::BufferExhausted) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::Obj;

    #[test]
    fn fixed_width_round_trip() {
        let src = [1i32, -2, 3];
        let mut wire = vec![0u8; 12];
        let end = pack(&src, 0, 3, &mut wire, 0).unwrap();
        assert_eq!(end, 12);

        let mut dst = [0i32; 3];
        let consumed = unpack(&wire, 0, &mut dst, 0, 3).unwrap();
        assert_eq!(consumed, 12);
        assert_eq!(dst, src);
    }

    #[test]
    fn booleans_are_one_byte() {
        let src = [true, false, true];
        let wire = pack_alloc(&src, 0, 3).unwrap();
        assert_eq!(wire, [1, 0, 1]);
    }

    #[test]
    fn pack_truncates_to_whole_elements() {
        let src = [1i32, 2, 3];
        // Room for two elements plus a partial third.
        let mut wire = vec![0u8; 10];
        let end = pack(&src, 0, 3, &mut wire, 0).unwrap();
        assert_eq!(end, 8);
    }

    #[test]
    fn unpack_truncates_to_destination() {
        let wire = pack_alloc(&[1i32, 2, 3], 0, 3).unwrap();
        let mut dst = [0i32; 2];
        let consumed = unpack(&wire, 0, &mut dst, 0, 3).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(dst, [1, 2]);
    }

    #[test]
    fn offsets_and_positions_compose() {
        let src = [0i32, 7, 8, 9];
        let mut wire = vec![0u8; 16];
        let mid = pack(&src, 1, 2, &mut wire, 4).unwrap();
        assert_eq!(mid, 12);

        let mut dst = [0i32; 4];
        let consumed = unpack(&wire, 4, &mut dst, 2, 2).unwrap();
        assert_eq!(consumed, 12);
        assert_eq!(dst, [0, 0, 7, 8]);
    }

    #[test]
    fn object_elements_round_trip() {
        let src = [Obj("a".to_string()), Obj("bc".to_string())];
        let wire = pack_alloc(&src, 0, 2).unwrap();
        let mut dst = [Obj(String::new()), Obj(String::new())];
        unpack(&wire, 0, &mut dst, 0, 2).unwrap();
        assert_eq!(dst[0].0, "a");
        assert_eq!(dst[1].0, "bc");
    }
}
