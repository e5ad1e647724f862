use super::{OwnedSignature, Signature, SignatureError, SignatureErrorKind, MAX_SIGNATURE};

use SignatureErrorKind::*;

macro_rules! test {
    ($input:expr, $expected:pat) => {{
        let actual = Signature::new($input).map_err(|e| e.kind);

        assert!(
            matches!(actual, $expected),
            "{actual:?} does not match {}",
            stringify!($expected)
        );
    }};
}

#[test]
fn signature_tests() {
    test!(b"", Ok(..));
    test!(b"sss", Ok(..));
    test!(b"i", Ok(..));
    test!(b"b", Ok(..));
    test!(b"ai", Ok(..));
    test!(b"(i)", Ok(..));
    test!(b"a{sv}", Ok(..));
    test!(b"a{s(ia{sv})}", Ok(..));
    test!(b"w", Err(UnknownTypeCode(b'w')));
    test!(b"r", Err(UnknownTypeCode(b'r')));
    test!(b"e", Err(UnknownTypeCode(b'e')));
    test!(b"a", Err(MissingArrayElementType));
    test!(b"aaaaaa", Err(MissingArrayElementType));
    test!(b"ii(ii)a", Err(MissingArrayElementType));
    test!(b"ia", Err(MissingArrayElementType));
    test!(b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaai", Ok(..));
    test!(
        b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaai",
        Err(ExceededMaximumArrayRecursion)
    );
    test!(b")", Err(StructEndedButNotStarted));
    test!(b"}", Err(DictEndedButNotStarted));
    test!(b"i)", Err(StructEndedButNotStarted));
    test!(b"a)", Err(MissingArrayElementType));
    test!(b"(", Err(StructStartedButNotEnded));
    test!(b"(i", Err(StructStartedButNotEnded));
    test!(b"(iiiii", Err(StructStartedButNotEnded));
    test!(b"(ai", Err(StructStartedButNotEnded));
    test!(b"a{si", Err(DictStartedButNotEnded));
    test!(b"()", Err(StructHasNoFields));
    test!(b"(())", Err(StructHasNoFields));
    test!(b"a()", Err(StructHasNoFields));
    test!(b"i()", Err(StructHasNoFields));
    test!(b"()i", Err(StructHasNoFields));
    test!(b"(a)", Err(MissingArrayElementType));
    test!(b"a{ia}", Err(MissingArrayElementType));
    test!(b"a{}", Err(DictEntryHasNoFields));
    test!(b"a{aii}", Err(DictKeyMustBeBasicType));
    test!(b"a{vs}", Err(DictKeyMustBeBasicType));
    test!(b" ", Err(UnknownTypeCode(..)));
    test!(b"not a valid signature", Err(UnknownTypeCode(..)));
    test!(b"123", Err(UnknownTypeCode(..)));
    test!(b".", Err(UnknownTypeCode(..)));
    test!(b"a{(ii)i}", Err(DictKeyMustBeBasicType));
    test!(b"a{i}", Err(DictEntryHasOnlyOneField));
    test!(b"{is}", Err(DictEntryNotInsideArray));
    test!(b"a({is})", Err(DictEntryNotInsideArray));
    test!(b"a{isi}", Err(DictEntryHasTooManyFields));
    test!(&[b'i'; 255], Ok(..));
    test!(&[b'i'; MAX_SIGNATURE], Err(SignatureTooLong));
    test! {
        b"((((((((((((((((((((((((((((((((ii))))))))))))))))))))))))))))))))",
        Ok(..)
    };
    test! {
        b"(((((((((((((((((((((((((((((((((ii))))))))))))))))))))))))))))))))",
        Err(ExceededMaximumStructRecursion)
    };
}

#[test]
fn sibling_arrays_do_not_accumulate_depth() {
    // 40 sibling arrays, each of which has depth one.
    let signature = b"ai".repeat(40);
    assert!(Signature::new(&signature).is_ok());
}

#[test]
fn single_complete_types() {
    let sig = Signature::new_const(b"ya(ii)a{sv}vaai(a{yy}s)");

    let types = sig.iter().map(Signature::as_str).collect::<Vec<_>>();

    assert_eq!(
        types,
        ["y", "a(ii)", "a{sv}", "v", "aai", "(a{yy}s)"]
    );

    assert!(Signature::new_const(b"a{sv}").is_single_complete_type());
    assert!(!Signature::new_const(b"ss").is_single_complete_type());
    assert!(!Signature::EMPTY.is_single_complete_type());
}

#[test]
fn containers() {
    let sig = Signature::new_const(b"(ia{sv})");
    assert_eq!(sig.inner().as_str(), "ia{sv}");

    let sig = Signature::new_const(b"aa{sv}");
    assert_eq!(sig.tail().as_str(), "a{sv}");
    assert_eq!(sig.tail().tail().inner().as_str(), "sv");
}

#[test]
fn owned_signature_length() {
    let mut sig = OwnedSignature::new();

    for _ in 0..255 {
        assert!(sig.extend_from_signature(Signature::BYTE).is_ok());
    }

    let error = sig.extend_from_signature(Signature::BYTE).unwrap_err();
    assert_eq!(error.kind, SignatureTooLong);
    assert_eq!(sig.len(), 255);
}

#[test]
fn array_elements() -> Result<(), SignatureError> {
    assert_eq!(Signature::new_array_element(b"{sv}")?, "{sv}");
    assert_eq!(Signature::new_array_element(b"a{s(ii)}")?, "a{s(ii)}");
    assert_eq!(Signature::new_array_element(b"u")?, "u");

    let error = Signature::new_array_element(b"uu").unwrap_err();
    assert_eq!(error.kind, NotSingleCompleteType);

    let error = Signature::new_array_element(b"").unwrap_err();
    assert_eq!(error.kind, MissingArrayElementType);

    let error = Signature::new_array_element(b"{vs}").unwrap_err();
    assert_eq!(error.kind, DictKeyMustBeBasicType);

    let error = Signature::new_array_element(&[b'y'; 255]).unwrap_err();
    assert_eq!(error.kind, SignatureTooLong);
    Ok(())
}
