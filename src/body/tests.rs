use crate::buf::AlignedBuf;
use crate::error::Result;
use crate::proto::Endianness;
use crate::{Body, BodyBuf, ObjectPath, Signature, Value};

fn nested_variants(n: usize) -> Value {
    let mut value = Value::UInt32(7);

    for _ in 0..n {
        value = Value::Variant(Box::new(value));
    }

    value
}

/// A variant holding an array of a single variant, `levels` times over,
/// around a `u32`.
fn nested_arrays(levels: usize) -> Value {
    let mut value = Value::Variant(Box::new(Value::UInt32(7)));

    for _ in 0..levels {
        value = Value::Variant(Box::new(Value::Array(
            Signature::VARIANT.to_owned(),
            vec![value],
        )));
    }

    value
}

/// Write the same layout as `nested_arrays` without any checks on depth.
fn write_nested_arrays(buf: &mut AlignedBuf, levels: usize) -> Result<()> {
    if levels == 0 {
        buf.write::<Signature>(Signature::UINT32);
        buf.store(7u32);
        return Ok(());
    }

    buf.write::<Signature>(Signature::new(b"av")?);
    let mut array = buf.write_array(Signature::VARIANT);
    write_nested_arrays(&mut array, levels - 1)?;
    array.finish()
}

#[test]
fn store_and_read_values() -> Result<()> {
    for endianness in [Endianness::LITTLE, Endianness::BIG] {
        let mut buf = BodyBuf::with_endianness(endianness);

        let dict = Value::Array(
            Signature::new_array_element(b"{sv}")?.to_owned(),
            vec![
                Value::DictEntry(
                    Box::new(Value::from("name")),
                    Box::new(Value::Variant(Box::new(Value::from("bus")))),
                ),
                Value::DictEntry(
                    Box::new(Value::from("point")),
                    Box::new(Value::Variant(Box::new(Value::Struct(vec![
                        Value::Int16(-3),
                        Value::Double(1.5),
                    ])))),
                ),
            ],
        );

        buf.store(1u8)?;
        buf.store_value(&dict)?;
        buf.store(ObjectPath::new(b"/org/freedesktop/DBus")?)?;
        buf.store(u64::MAX)?;

        assert_eq!(buf.signature(), "ya{sv}ot");

        let mut body = buf.as_body();
        assert_eq!(body.endianness(), endianness);

        let values = body.values()?;

        assert_eq!(
            values,
            [
                Value::Byte(1),
                dict.clone(),
                Value::from(ObjectPath::new(b"/org/freedesktop/DBus")?),
                Value::UInt64(u64::MAX),
            ]
        );
    }

    Ok(())
}

#[test]
fn big_endian_layout() -> Result<()> {
    let mut buf = BodyBuf::with_endianness(Endianness::BIG);
    buf.store(1u8)?;
    buf.store(0x01020304u32)?;
    buf.store(true)?;

    assert_eq!(buf.get(), &[1, 0, 0, 0, 1, 2, 3, 4, 0, 0, 0, 1]);
    Ok(())
}

#[test]
fn empty_array_padding() -> Result<()> {
    let mut buf = BodyBuf::with_endianness(Endianness::LITTLE);
    buf.store_value(&Value::Array(Signature::UINT64.to_owned(), Vec::new()))?;

    // Padding up to the first element is written but not counted.
    assert_eq!(buf.get(), &[0, 0, 0, 0, 0, 0, 0, 0]);

    let mut body = buf.as_body();
    assert_eq!(
        body.values()?,
        [Value::Array(Signature::UINT64.to_owned(), Vec::new())]
    );
    Ok(())
}

#[test]
fn array_of_structs() -> Result<()> {
    let mut buf = BodyBuf::with_endianness(Endianness::LITTLE);

    let value = Value::Array(
        Signature::new(b"(yu)")?.to_owned(),
        vec![
            Value::Struct(vec![Value::Byte(1), Value::UInt32(2)]),
            Value::Struct(vec![Value::Byte(3), Value::UInt32(4)]),
        ],
    );

    buf.store_value(&value)?;

    assert_eq!(
        buf.get(),
        &[
            16, 0, 0, 0, 0, 0, 0, 0, // length and padding
            1, 0, 0, 0, 2, 0, 0, 0, // first
            3, 0, 0, 0, 4, 0, 0, 0, // second
        ]
    );

    assert_eq!(buf.as_body().values()?, [value]);
    Ok(())
}

#[test]
fn array_element_mismatch() -> Result<()> {
    let mut buf = BodyBuf::new();
    buf.store(5u32)?;

    let value = Value::Array(
        Signature::STRING.to_owned(),
        vec![Value::from("a"), Value::UInt32(2)],
    );

    let error = buf.store_value(&value).unwrap_err();
    assert!(error.is_encoding());

    assert_eq!(buf.signature(), "u");
    assert_eq!(buf.len(), 4);
    Ok(())
}

#[test]
fn empty_struct_rejected() {
    let mut buf = BodyBuf::new();
    assert!(buf.store_value(&Value::Struct(Vec::new())).is_err());
    assert!(buf.is_empty());
}

#[test]
fn invalid_boolean() {
    let mut body = Body::new(&[2, 0, 0, 0], Endianness::LITTLE, Signature::BOOLEAN);
    assert!(body.value().unwrap_err().is_malformed());

    let mut body = Body::new(&[0, 0, 0, 1], Endianness::BIG, Signature::BOOLEAN);
    assert!(body.load_bool().unwrap());
}

#[test]
fn variant_with_multiple_types() {
    // Variant signature "uu" is not a single complete type.
    let data = [2, b'u', b'u', 0, 1, 0, 0, 0, 2, 0, 0, 0];
    let mut body = Body::new(&data, Endianness::LITTLE, Signature::VARIANT);
    assert!(body.value().unwrap_err().is_malformed());
}

#[test]
fn variant_depth() -> Result<()> {
    let mut buf = BodyBuf::new();
    buf.store_value(&nested_variants(64))?;
    assert_eq!(buf.as_body().values()?, [nested_variants(64)]);

    let mut buf = BodyBuf::new();
    assert!(buf.store_value(&nested_variants(65)).is_err());
    assert!(buf.is_empty());

    let mut data = Vec::new();

    for _ in 0..64 {
        data.extend_from_slice(&[1, b'v', 0]);
    }

    data.extend_from_slice(&[1, b'u', 0]);

    while data.len() % 4 != 0 {
        data.push(0);
    }

    data.extend_from_slice(&7u32.to_le_bytes());

    let mut body = Body::new(&data, Endianness::LITTLE, Signature::VARIANT);
    assert!(body.value().unwrap_err().is_malformed());
    Ok(())
}

#[test]
fn trailing_bytes() {
    let data = [1, 0, 0, 0, 0xff];
    let mut body = Body::new(&data, Endianness::LITTLE, Signature::UINT32);
    assert!(body.values().unwrap_err().is_malformed());
}

#[test]
fn truncated_string() {
    let data = [10, 0, 0, 0, b'a', b'b', 0];
    let mut body = Body::new(&data, Endianness::LITTLE, Signature::STRING);
    assert!(body.values().unwrap_err().is_malformed());
}

#[test]
fn signature_too_long() -> Result<()> {
    let mut buf = BodyBuf::new();

    for _ in 0..255 {
        buf.store(1u8)?;
    }

    assert!(buf.store(1u8).is_err());
    assert_eq!(buf.signature().len(), 255);
    assert_eq!(buf.len(), 255);
    Ok(())
}

#[test]
fn nesting_is_counted_across_variants() -> Result<()> {
    // 31 arrays and 32 variants is within every limit.
    let mut buf = BodyBuf::new();
    buf.store_value(&nested_arrays(31))?;
    assert_eq!(buf.as_body().values()?, [nested_arrays(31)]);

    // 32 arrays and 33 variants are 65 containers in total.
    let mut buf = BodyBuf::new();
    let error = buf.store_value(&nested_arrays(32)).unwrap_err();
    assert!(error.is_malformed());
    assert!(buf.is_empty());

    for levels in [32, 33, 1000] {
        let mut data = AlignedBuf::with_endianness(Endianness::LITTLE);
        write_nested_arrays(&mut data, levels)?;

        let mut body = Body::new(data.get(), Endianness::LITTLE, Signature::VARIANT);
        let error = body.value().unwrap_err();
        assert!(error.is_malformed(), "{levels}: {error}");
    }

    Ok(())
}

#[test]
fn structs_nested_through_variants() -> Result<()> {
    let mut value = Value::UInt32(1);

    for _ in 0..32 {
        value = Value::Struct(vec![Value::Variant(Box::new(value))]);
    }

    // 32 structs and 32 variants.
    let mut buf = BodyBuf::new();
    buf.store_value(&value)?;
    assert_eq!(buf.as_body().values()?, [value.clone()]);

    // A 33rd struct.
    let value = Value::Struct(vec![value]);
    let mut buf = BodyBuf::new();
    assert!(buf.store_value(&value).is_err());
    Ok(())
}
