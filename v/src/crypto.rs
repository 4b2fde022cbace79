use sha1::{Digest, Sha1};

/// 密码摘要 / password digest
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> String;
}

/// SHA-1 十六进制摘要 / SHA-1 hex digest
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha1Hasher;

impl PasswordHasher for Sha1Hasher {
    fn hash(&self, plain: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(plain.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
