// rust/trainkit-core/src/checkpoint/component.rs

//! Serializable pieces of training state.

use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, TrainkitError};

/// A named, independently serializable piece of process state, such as model
/// weights or optimizer state.
///
/// The store never inspects the bytes; it only calls these two methods.
pub trait Component: Send + Sync {
    /// Captures the current state.
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Replaces the current state with a previously captured one.
    fn deserialize(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Shared handle the store keeps for a registered component.
///
/// The training loop keeps its own clone (usually with the concrete type)
/// and mutates the state between saves.
pub type ComponentHandle = Arc<RwLock<dyn Component>>;

/// Wraps a component in a [`ComponentHandle`].
pub fn shared<C: Component + 'static>(component: C) -> ComponentHandle {
    Arc::new(RwLock::new(component))
}

/// Adapts any serde type to [`Component`] using bincode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BincodeComponent<T> {
    value: T,
}

impl<T> BincodeComponent<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Component for BincodeComponent<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.value)
            .map_err(|e| TrainkitError::serialization(format!("failed to encode component: {e}")))
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        self.value = bincode::deserialize(bytes)
            .map_err(|e| TrainkitError::serialization(format!("failed to decode component: {e}")))?;
        Ok(())
    }
}

/// Opaque bytes, stored and restored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawComponent {
    bytes: Vec<u8>,
}

impl RawComponent {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Component for RawComponent {
    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes = bytes.to_vec();
        Ok(())
    }
}

/// Component names become file names, so they must be a single plain path
/// segment that cannot collide with staging entries.
pub(crate) fn validate_component_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TrainkitError::checkpoint("component name must not be empty"));
    }
    if name.starts_with('.') {
        return Err(TrainkitError::checkpoint(format!(
            "component name '{name}' must not start with '.'"
        )));
    }
    if name.contains(['/', '\\']) || name.contains('\0') {
        return Err(TrainkitError::checkpoint(format!(
            "component name '{name}' must not contain path separators"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Weights {
        layers: Vec<f32>,
        epoch: u32,
    }

    #[test]
    fn test_bincode_component_restores_into_fresh_value() {
        let source = BincodeComponent::new(Weights {
            layers: vec![0.5, -1.25],
            epoch: 7,
        });
        let bytes = source.serialize().unwrap();

        let mut target = BincodeComponent::<Weights>::default();
        target.deserialize(&bytes).unwrap();

        assert_eq!(target.get(), source.get());
    }

    #[test]
    fn test_bincode_component_rejects_garbage() {
        let mut target = BincodeComponent::<Weights>::default();

        let err = target.deserialize(&[1, 2]).unwrap_err();
        assert!(matches!(err, TrainkitError::Serialization { .. }));
    }

    #[test]
    fn test_raw_component() {
        let mut raw = RawComponent::new(b"abc".to_vec());
        assert_eq!(raw.serialize().unwrap(), b"abc");

        raw.deserialize(b"xyz").unwrap();
        assert_eq!(raw.bytes(), b"xyz");
    }

    #[test]
    fn test_typed_handle_coerces_to_component_handle() {
        let typed = Arc::new(RwLock::new(RawComponent::new(vec![1])));
        let handle: ComponentHandle = typed.clone();

        handle.write().unwrap().deserialize(&[9, 9]).unwrap();
        assert_eq!(typed.read().unwrap().bytes(), &[9, 9]);
    }

    #[test]
    fn test_component_names() {
        assert!(validate_component_name("model").is_ok());
        assert!(validate_component_name("optimizer_state-2").is_ok());

        for bad in ["", ".hidden", "a/b", "a\\b"] {
            assert!(
                matches!(validate_component_name(bad), Err(TrainkitError::Checkpoint { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
