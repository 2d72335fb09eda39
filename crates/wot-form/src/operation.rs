use serde::Serialize;

/// All [`OperationType`]s.
pub const ALL_OPERATIONS: &[OperationType] = &[
    OperationType::ReadProperty,
    OperationType::WriteProperty,
    OperationType::ObserveProperty,
    OperationType::UnobserveProperty,
    OperationType::ReadMultipleProperties,
    OperationType::ReadAllProperties,
    OperationType::WriteMultipleProperties,
    OperationType::InvokeAction,
    OperationType::SubscribeEvent,
    OperationType::UnsubscribeEvent,
];

/// All operations a consumer may perform through a form.
///
/// A protocol binding uses the operation as a fallback to derive its
/// protocol parameters whenever a form does not declare them explicitly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Reads a single property value.
    ReadProperty,
    /// Writes a single property value.
    WriteProperty,
    /// Observes the changes of a property value.
    ObserveProperty,
    /// Stops observing a property.
    UnobserveProperty,
    /// Reads several property values at once.
    ReadMultipleProperties,
    /// Reads all property values at once.
    ReadAllProperties,
    /// Writes several property values at once.
    WriteMultipleProperties,
    /// Invokes an action.
    InvokeAction,
    /// Subscribes to an event.
    SubscribeEvent,
    /// Cancels an event subscription.
    UnsubscribeEvent,
}

impl core::fmt::Debug for OperationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.name().fmt(f)
    }
}

impl core::fmt::Display for OperationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.name().fmt(f)
    }
}

impl OperationType {
    /// Returns the [`OperationType`] name, as written inside a form.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReadProperty => "readproperty",
            Self::WriteProperty => "writeproperty",
            Self::ObserveProperty => "observeproperty",
            Self::UnobserveProperty => "unobserveproperty",
            Self::ReadMultipleProperties => "readmultipleproperties",
            Self::ReadAllProperties => "readallproperties",
            Self::WriteMultipleProperties => "writemultipleproperties",
            Self::InvokeAction => "invokeaction",
            Self::SubscribeEvent => "subscribeevent",
            Self::UnsubscribeEvent => "unsubscribeevent",
        }
    }

    /// Returns the [`OperationType`] associated with the given name.
    ///
    /// The return value is [`None`] when the name is unknown.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_OPERATIONS
            .iter()
            .find(|operation| operation.name() == name)
            .copied()
    }

    /// Whether the operation reads one or more property values.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(
            self,
            Self::ReadProperty | Self::ReadMultipleProperties | Self::ReadAllProperties
        )
    }

    /// Whether the operation writes one or more property values.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::WriteProperty | Self::WriteMultipleProperties)
    }

    /// Whether the operation invokes an action.
    #[must_use]
    pub const fn is_invoke(&self) -> bool {
        matches!(self, Self::InvokeAction)
    }

    /// Whether the operation opens a long-lived notification flow, either by
    /// observing a property or by subscribing to an event.
    #[must_use]
    pub const fn is_subscription(&self) -> bool {
        matches!(self, Self::ObserveProperty | Self::SubscribeEvent)
    }

    /// Whether the operation closes a notification flow.
    #[must_use]
    pub const fn is_unsubscription(&self) -> bool {
        matches!(self, Self::UnobserveProperty | Self::UnsubscribeEvent)
    }
}

#[cfg(test)]
#[cfg(feature = "deserialize")]
mod tests {
    use crate::{deserialize, serialize};

    use super::{ALL_OPERATIONS, OperationType};

    #[test]
    fn test_operation_names() {
        assert_eq!(OperationType::from_name("readevent"), None);

        for operation in ALL_OPERATIONS {
            assert_eq!(OperationType::from_name(operation.name()), Some(*operation));
            assert_eq!(serialize(operation), serde_json::json!(operation.name()));
            assert_eq!(deserialize::<OperationType>(serialize(operation)), *operation);
        }
    }

    #[test]
    fn test_operation_families() {
        // Every operation belongs to exactly one family.
        for operation in ALL_OPERATIONS {
            let families = [
                operation.is_read(),
                operation.is_write(),
                operation.is_invoke(),
                operation.is_subscription(),
                operation.is_unsubscription(),
            ];
            assert_eq!(families.iter().filter(|f| **f).count(), 1, "{operation}");
        }
    }
}
