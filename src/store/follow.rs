//! Follow-status propagation across stores holding user-shaped records.

use tracing::debug;

use super::paginated::PaginatedStore;
use super::traits::Followable;

/// A store that may hold copies of a user whose follow status can change.
pub trait FollowTarget {
  /// Patch every loaded copy of `user_id`. Returns whether any copy was found.
  fn set_following(&mut self, user_id: &str, is_following: bool) -> bool;
}

impl<T: Followable> FollowTarget for PaginatedStore<T> {
  fn set_following(&mut self, user_id: &str, is_following: bool) -> bool {
    self.apply_patch(user_id, |user| user.set_following(is_following))
  }
}

/// Apply a confirmed follow-status change to every target.
///
/// Returns the number of targets that held the user.
pub fn fan_out(targets: &mut [&mut dyn FollowTarget], user_id: &str, is_following: bool) -> usize {
  let patched = targets
    .iter_mut()
    .map(|target| target.set_following(user_id, is_following))
    .filter(|found| *found)
    .count();

  debug!(user_id, is_following, patched, "Follow status propagated");
  patched
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Fake {
    users: Vec<(String, bool)>,
  }

  impl FollowTarget for Fake {
    fn set_following(&mut self, user_id: &str, is_following: bool) -> bool {
      let mut found = false;
      for (_, follow) in self.users.iter_mut().filter(|(id, _)| id == user_id) {
        *follow = is_following;
        found = true;
      }
      found
    }
  }

  fn fake(ids: &[&str]) -> Fake {
    Fake {
      users: ids.iter().map(|id| (id.to_string(), false)).collect(),
    }
  }

  #[test]
  fn test_fan_out_touches_only_holders() {
    let mut a = fake(&["u1", "u2"]);
    let mut b = fake(&["u3"]);
    let mut c = fake(&["u1"]);

    let patched = fan_out(&mut [&mut a, &mut b, &mut c], "u1", true);

    assert_eq!(patched, 2);
    assert_eq!(a.users, vec![("u1".to_string(), true), ("u2".to_string(), false)]);
    assert_eq!(b.users, vec![("u3".to_string(), false)]);
    assert_eq!(c.users, vec![("u1".to_string(), true)]);
  }
}
