pub mod clients;
pub mod credentials;
pub mod utils;

pub use clients::sts::StsModule;
pub use clients::RoleImpersonator;
pub use credentials::{AssumeRoleRequest, CredentialBundle};
