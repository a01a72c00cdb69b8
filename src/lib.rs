pub mod v1;

pub mod prelude {
    pub use crate::v1::cloud::*;
    pub use crate::v1::config::*;
    pub use crate::v1::manager::*;
    pub use crate::v1::nomad::{
        acl_policy::*,
        client::{AclPolicy, AclPolicyApi, ClientError, JobAcl, NomadClient},
        config::NomadConfig,
        *,
    };
    pub use crate::v1::resource::{ResourceState::*, *};
}
