use uuid::Uuid;

/// Header carrying the caller identity, resolved by the upstream gateway.
pub const USER_IDENTITY_HEADER: &str = "x-user-identity";

/// The user on whose behalf a request runs. Trusted as supplied upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
}

impl Caller {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}
