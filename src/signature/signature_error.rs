use std::error;
use std::fmt;

use crate::lossy_str::LossyStr;

/// Error raised when validation of a [`Signature`] fails.
///
/// [`Signature`]: crate::Signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureError {
    pub(crate) kind: SignatureErrorKind,
}

impl SignatureError {
    #[inline]
    pub(crate) const fn new(kind: SignatureErrorKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignatureErrorKind {
    UnknownTypeCode(u8),
    SignatureTooLong,
    MissingArrayElementType,
    StructEndedButNotStarted,
    DictEndedButNotStarted,
    StructStartedButNotEnded,
    DictStartedButNotEnded,
    StructHasNoFields,
    DictKeyMustBeBasicType,
    DictEntryHasNoFields,
    DictEntryHasOnlyOneField,
    DictEntryNotInsideArray,
    ExceededMaximumArrayRecursion,
    ExceededMaximumStructRecursion,
    ExceededMaximumDictRecursion,
    DictEntryHasTooManyFields,
    NotSingleCompleteType,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SignatureErrorKind::*;

        match self.kind {
            UnknownTypeCode(code) => {
                write!(f, "Unknown type code: {:?}", LossyStr::new(&[code]))
            }
            SignatureTooLong => write!(f, "Signature too long"),
            MissingArrayElementType => write!(f, "Missing array element type"),
            StructEndedButNotStarted => write!(f, "Struct ended but not started"),
            DictEndedButNotStarted => write!(f, "Dict ended but not started"),
            StructStartedButNotEnded => write!(f, "Struct started but not ended"),
            DictStartedButNotEnded => write!(f, "Dict started but not ended"),
            StructHasNoFields => write!(f, "Struct has no fields"),
            DictKeyMustBeBasicType => write!(f, "Dict key must be basic type"),
            DictEntryHasNoFields => write!(f, "Dict entry has no fields"),
            DictEntryHasOnlyOneField => write!(f, "Dict entry has only one field"),
            DictEntryNotInsideArray => write!(f, "Dict entry not inside array"),
            ExceededMaximumArrayRecursion => write!(f, "Exceeded maximum array recursion"),
            ExceededMaximumStructRecursion => write!(f, "Exceeded maximum struct recursion"),
            ExceededMaximumDictRecursion => write!(f, "Exceeded maximum dict recursion"),
            DictEntryHasTooManyFields => write!(f, "Dict entry has too many fields"),
            NotSingleCompleteType => write!(f, "Not a single complete type"),
        }
    }
}

impl error::Error for SignatureError {}
