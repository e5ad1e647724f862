use crate::error::Result;
use crate::proto::{Endianness, Flags, HeaderField, MessageType};
use crate::Signature;

use super::{AlignedBuf, ReadBuf};

#[rustfmt::skip]
const LE_HEADER: [u8; 32] = [
    // yyyyuu fixed headers
    b'l', b'\x02', b'\x02', b'\x01',
    // bytes in body = 4
    b'\x04', b'\x00', b'\x00', b'\x00',
    // serial number = 0x12345678
    b'\x78', b'\x56', b'\x34', b'\x12',
    // bytes in array of variable headers = 15
    b'\x0f', b'\0', b'\0', b'\0',
    // in reply to: 0xabcdef12
    b'\x05', b'\x01', b'u', b'\0',
    b'\x12', b'\xef', b'\xcd', b'\xab',
    // signature: u
    b'\x08', b'\x01', b'g', b'\0',
    b'\x01', b'u', b'\0',
    // pad to 8-byte boundary for body
    b'\0',
];

#[rustfmt::skip]
const BE_HEADER: [u8; 32] = [
    b'B', b'\x02', b'\x02', b'\x01',
    b'\x00', b'\x00', b'\x00', b'\x04',
    b'\x12', b'\x34', b'\x56', b'\x78',
    b'\0', b'\0', b'\0', b'\x0f',
    b'\x05', b'\x01', b'u', b'\0',
    b'\xab', b'\xcd', b'\xef', b'\x12',
    b'\x08', b'\x01', b'g', b'\0',
    b'\x01', b'u', b'\0',
    b'\0',
];

fn write_header(buf: &mut AlignedBuf) -> Result<()> {
    buf.store(buf.endianness().get());
    buf.store(MessageType::METHOD_RETURN.get());
    buf.store((Flags::EMPTY | Flags::NO_AUTO_START).get());
    buf.store(1u8);
    buf.store(4u32);
    buf.store(0x12345678u32);

    let mut array = buf.write_array(Signature::new(b"(yv)")?);

    let st = array.write_struct();
    st.store(HeaderField::REPLY_SERIAL);
    st.write(Signature::UINT32);
    st.store(0xabcdef12u32);

    let st = array.write_struct();
    st.store(HeaderField::SIGNATURE);
    st.write(Signature::SIGNATURE);
    st.write(Signature::UINT32);

    array.finish()?;
    buf.align_mut(8);
    Ok(())
}

#[test]
fn write_headers() -> Result<()> {
    let mut buf = AlignedBuf::with_endianness(Endianness::LITTLE);
    write_header(&mut buf)?;
    assert_eq!(buf.get(), &LE_HEADER[..]);

    let mut buf = AlignedBuf::with_endianness(Endianness::BIG);
    write_header(&mut buf)?;
    assert_eq!(buf.get(), &BE_HEADER[..]);
    Ok(())
}

#[test]
fn read_headers() -> Result<()> {
    for (header, endianness) in [(&LE_HEADER, Endianness::LITTLE), (&BE_HEADER, Endianness::BIG)] {
        let mut buf = ReadBuf::new(header, endianness);
        buf.advance(4)?;
        assert_eq!(buf.load::<u32>()?, 4);
        assert_eq!(buf.load::<u32>()?, 0x12345678);

        let len = buf.load::<u32>()?;
        let mut fields = buf.read_until(len as usize)?;

        fields.align(8)?;
        assert_eq!(fields.load::<HeaderField>()?, HeaderField::REPLY_SERIAL);
        assert_eq!(fields.read::<Signature>()?, Signature::UINT32);
        assert_eq!(fields.load::<u32>()?, 0xabcdef12);

        fields.align(8)?;
        assert_eq!(fields.load::<HeaderField>()?, HeaderField::SIGNATURE);
        assert_eq!(fields.read::<Signature>()?, Signature::SIGNATURE);
        assert_eq!(fields.read::<Signature>()?, Signature::UINT32);
        assert!(fields.is_empty());

        buf.align(8)?;
        assert!(buf.is_empty());
    }

    Ok(())
}

#[test]
fn test_read_buf_load() -> Result<()> {
    let mut buf = AlignedBuf::new();
    buf.store(7u32);
    buf.extend_from_slice_nul(b"foo bar");

    let mut read_buf = ReadBuf::new(buf.get(), buf.endianness());
    let mut head = read_buf.read_until(6)?;

    assert_eq!(head.load::<u32>()?, 7u32);
    assert_eq!(head.load::<u8>()?, b'f');
    assert_eq!(head.load::<u8>()?, b'o');
    assert!(head.load::<u8>().is_err());
    assert_eq!(read_buf.get(), &[b'o', b' ', b'b', b'a', b'r', 0]);
    Ok(())
}

#[test]
fn test_nested_read_buf() -> Result<()> {
    let mut buf = AlignedBuf::new();
    buf.store(1u8);
    buf.store(0x0102u16);
    buf.store(0x03040506u32);

    let mut read_buf = ReadBuf::new(buf.get(), buf.endianness());
    assert_eq!(read_buf.load::<u8>()?, 1);

    // Nested buffers keep the alignment of their parent.
    let mut nested = read_buf.read_until(7)?;
    assert_eq!(nested.load::<u16>()?, 0x0102);
    assert_eq!(nested.load::<u32>()?, 0x03040506);

    assert!(nested.is_empty());
    assert!(read_buf.is_empty());
    Ok(())
}

#[test]
fn strings() -> Result<()> {
    let mut buf = AlignedBuf::with_endianness(Endianness::LITTLE);
    buf.store(1u8);
    buf.write("hello");

    assert_eq!(buf.get(), b"\x01\0\0\0\x05\0\0\0hello\0");

    let mut read_buf = ReadBuf::new(buf.get(), Endianness::LITTLE);
    assert_eq!(read_buf.load::<u8>()?, 1);
    assert_eq!(read_buf.read::<str>()?, "hello");

    let mut missing_nul = ReadBuf::new(b"\x02\0\0\0hix", Endianness::LITTLE);
    assert!(missing_nul.read::<str>().is_err());

    let mut interior_nul = ReadBuf::new(b"\x03\0\0\0h\0i\0", Endianness::LITTLE);
    assert!(interior_nul.read::<str>().is_err());
    Ok(())
}

#[test]
fn empty_array_is_padded() -> Result<()> {
    let mut buf = AlignedBuf::with_endianness(Endianness::LITTLE);

    let array = buf.write_array(Signature::INT64);
    array.finish()?;

    // The length, followed by padding up to 8 which is not part of the
    // length.
    assert_eq!(buf.get(), &[0, 0, 0, 0, 0, 0, 0, 0]);
    Ok(())
}
