pub const DEFAULT_NAMESPACE: &str = "base";

/// The fields one namespace was asked for, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldGroup {
    /// Specifiers exactly as requested (`assoc:position`).
    pub names: Vec<String>,
    /// Field names with the namespace stripped (`position`).
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedFields {
    groups: Vec<(String, FieldGroup)>,
}

impl RoutedFields {
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(namespace, _)| namespace.as_str())
    }

    pub fn get(&self, namespace: &str) -> Option<&FieldGroup> {
        self.groups
            .iter()
            .find(|(name, _)| name == namespace)
            .map(|(_, group)| group)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldGroup)> {
        self.groups
            .iter()
            .map(|(namespace, group)| (namespace.as_str(), group))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub struct FieldRouter;

impl FieldRouter {
    /// Groups specifiers by namespace. Only the first `:` separates the
    /// namespace; bare names go to [`DEFAULT_NAMESPACE`].
    pub fn split<I, S>(specifiers: I) -> RoutedFields
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut routed = RoutedFields::default();
        for specifier in specifiers {
            let specifier = specifier.as_ref();
            let (namespace, field) = specifier
                .split_once(':')
                .unwrap_or((DEFAULT_NAMESPACE, specifier));

            let index = match routed.groups.iter().position(|(name, _)| name == namespace) {
                Some(index) => index,
                None => {
                    routed
                        .groups
                        .push((namespace.to_string(), FieldGroup::default()));
                    routed.groups.len() - 1
                }
            };
            let group = &mut routed.groups[index].1;
            group.names.push(specifier.to_string());
            group.fields.push(field.to_string());
        }
        routed
    }
}
