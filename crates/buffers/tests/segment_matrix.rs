use ion_buffers::{var_int_len, var_uint_len, BufferError, Reader, SegmentBuffer};
use proptest::prelude::*;

fn write_streak(buffer: &mut SegmentBuffer, f: impl FnOnce(&mut SegmentBuffer) -> usize) -> (usize, Vec<u8>) {
    buffer.start_streak(Vec::new());
    let written = f(buffer);
    let list = buffer.wrapup().unwrap_or_default();
    (written, buffer.to_vec(&list))
}

#[test]
fn segment_reader_primitive_matrix() {
    let mut buffer = SegmentBuffer::with_block_size(16);
    let (written, bytes) = write_streak(&mut buffer, |b| {
        b.write_var_uint(0)
            + b.write_var_uint(300)
            + b.write_var_int(-1)
            + b.write_var_int_parts(0, true)
            + b.write_uint(0x0100ff, 3)
            + b.write_utf8("ion")
    });
    assert_eq!(written, bytes.len());
    assert_eq!(
        bytes,
        vec![0x80, 0x02, 0xac, 0xc1, 0xc0, 0x01, 0x00, 0xff, b'i', b'o', b'n']
    );

    let mut reader = Reader::new(&bytes);
    assert_eq!(reader.var_uint(), Ok(0));
    assert_eq!(reader.var_uint(), Ok(300));
    assert_eq!(reader.var_int(), Ok((true, 1)));
    assert_eq!(reader.var_int(), Ok((true, 0)));
    assert_eq!(reader.uint(3), Ok(0x0100ff));
    assert_eq!(reader.utf8(3), Ok("ion"));
    assert_eq!(reader.u8(), Err(BufferError::EndOfBuffer));
}

#[test]
fn segment_truncated_var_uint_leaves_cursor() {
    let data = [0x01, 0x02];
    let mut reader = Reader::new(&data);
    assert_eq!(reader.var_uint(), Err(BufferError::EndOfBuffer));
    assert_eq!(reader.x, 0);
}

#[test]
fn segment_signed_magnitude_int() {
    let data = [0x80, 0x05, 0x00];
    let mut reader = Reader::new(&data);
    assert_eq!(reader.int(2), Ok((true, vec![0x00, 0x05])));
    assert_eq!(reader.int(0), Ok((false, Vec::new())));
    assert_eq!(reader.int(2), Err(BufferError::EndOfBuffer));
}

proptest! {
    #[test]
    fn segment_var_uint_matches_reader(value in any::<u64>(), block in 16usize..64) {
        let mut buffer = SegmentBuffer::with_block_size(block);
        let (written, bytes) = write_streak(&mut buffer, |b| b.write_var_uint(value));
        prop_assert_eq!(written, var_uint_len(value));
        prop_assert_eq!(Reader::new(&bytes).var_uint(), Ok(value));
    }

    #[test]
    fn segment_var_int_matches_reader(value in (i64::MIN + 1)..=i64::MAX) {
        let mut buffer = SegmentBuffer::new();
        let (written, bytes) = write_streak(&mut buffer, |b| b.write_var_int(value));
        prop_assert_eq!(written, var_int_len(value.unsigned_abs()));
        prop_assert_eq!(Reader::new(&bytes).var_int(), Ok((value < 0, value.unsigned_abs())));
    }
}
