//! Ownership Linker
//!
//! Every generated object is stamped with a controller owner reference back
//! to the Instance or Backup that caused it, so Kubernetes garbage
//! collection cascades deletes. `kube::Resource` gives uniform access to
//! object metadata across all the generated kinds.

use crate::error::{Error, Result};
use kube::{Resource, ResourceExt};

/// Make `owner` the managing controller of `object`.
///
/// Rejected when the owner has not been persisted yet (no uid), when the
/// two live in different namespaces, or when another controller already
/// owns the object. Re-linking the same owner is idempotent.
pub fn set_controller_reference<O, K>(owner: &O, object: &mut K) -> Result<()>
where
    O: Resource<DynamicType = ()>,
    K: Resource<DynamicType = ()>,
{
    let reject = |object: &K, reason: &str| Error::OwnerReference {
        owner_kind: O::kind(&()).to_string(),
        owner_name: owner.name_any(),
        kind: K::kind(&()).to_string(),
        name: object.name_any(),
        reason: reason.to_string(),
    };

    let mut owner_ref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| reject(object, "owner has no name or uid"))?;
    owner_ref.block_owner_deletion = Some(true);

    if let (Some(owner_ns), Some(object_ns)) =
        (owner.meta().namespace.as_deref(), object.meta().namespace.as_deref())
    {
        if owner_ns != object_ns {
            return Err(reject(object, "cross-namespace owner references are disallowed"));
        }
    }

    if object
        .owner_references()
        .iter()
        .any(|r| r.controller == Some(true) && r.uid != owner_ref.uid)
    {
        return Err(reject(object, "object is already owned by another controller"));
    }

    let refs = object.meta_mut().owner_references.get_or_insert_with(Vec::new);
    refs.retain(|r| r.uid != owner_ref.uid);
    refs.push(owner_ref);
    Ok(())
}
