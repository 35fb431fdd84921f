mod signature;

pub use signature::{RequireSignature, RequireSignatureService, SignatureGuard, SignatureRejection, SIGNATURE_HEADER};
