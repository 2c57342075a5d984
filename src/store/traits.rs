//! Traits implemented by records held in list stores.

/// A record that can live in a paginated list store.
pub trait ListItem: Clone + Send + Sync + 'static {
  /// Immutable identifier used to find the record for local patches
  fn item_id(&self) -> &str;

  /// Entity type name used in logs (e.g., "notification")
  fn entity_type() -> &'static str;
}

/// A user-shaped record that carries the viewer's follow status.
pub trait Followable: ListItem {
  fn set_following(&mut self, is_following: bool);
}
