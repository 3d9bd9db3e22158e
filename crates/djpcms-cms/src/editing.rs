//! Moving and deleting block contents.
//!
//! Both operations keep the positions of every group dense. Positions are
//! shifted from the highest down and renumbered from the lowest up, so no
//! write ever lands on a `(page, block, position)` triple that is still in
//! use.

use djpcms_core::storage::Manager;

use crate::blocks::Cms;
use crate::error::{CmsError, CmsResult};
use crate::models::BlockContent;

/// Where a record moves, relative to another record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
	/// Right after the record with this id.
	After(u64),
	/// Right before the record with this id.
	Before(u64),
}

impl Neighbor {
	fn id(self) -> u64 {
		match self {
			Self::After(id) | Self::Before(id) => id,
		}
	}
}

impl Cms {
	/// Moves record `id` next to `neighbor`, possibly into another block of
	/// the same page. Returns the moved record as stored afterwards.
	///
	/// # Errors
	///
	/// [`CmsError::InvalidMove`] for moving a placeholder, moving a record
	/// relative to itself or to a record of another page, and moving after a
	/// placeholder.
	pub fn rearrange(&self, id: u64, neighbor: Neighbor) -> CmsResult<BlockContent> {
		if neighbor.id() == id {
			return Err(CmsError::InvalidMove(format!("content {id} cannot move next to itself")));
		}
		let _groups = self.lock_groups();
		let mut record = self.contents().get_by_pk(id)?;
		let other = self.contents().get_by_pk(neighbor.id())?;
		if record.is_placeholder() {
			return Err(CmsError::InvalidMove("the placeholder cannot be moved".to_string()));
		}
		if other.page != record.page {
			return Err(CmsError::InvalidMove(format!(
				"content {id} belongs to page {}, not {}",
				record.page, other.page
			)));
		}
		let target = match neighbor {
			Neighbor::After(_) if other.is_placeholder() => {
				return Err(CmsError::InvalidMove(
					"nothing can follow the placeholder".to_string(),
				));
			}
			Neighbor::After(_) => other.position + 1,
			Neighbor::Before(_) => other.position,
		};
		let source_block = record.block;
		if source_block == other.block && record.position == target {
			return Ok(record);
		}

		let destination = self.group(record.page, other.block)?;
		let parked = destination
			.iter()
			.filter(|r| r.id != record.id)
			.map(|r| r.position)
			.max()
			.map_or(0, |max| max + 2);
		record.block = other.block;
		record.position = parked;
		self.contents().save(&mut record)?;

		for mut shifted in destination
			.into_iter()
			.rev()
			.filter(|r| r.id != record.id && r.position >= target)
		{
			shifted.position += 1;
			self.contents().save(&mut shifted)?;
		}
		record.position = target;
		self.contents().save(&mut record)?;
		tracing::debug!(
			content = id,
			page = record.page,
			from_block = source_block,
			block = record.block,
			position = target,
			"moved content"
		);

		if source_block != record.block {
			self.compact(record.page, source_block)?;
		}
		self.compact(record.page, record.block)?;
		Ok(self.contents().get_by_pk(id)?)
	}

	/// Deletes `record` and closes the gap it leaves. Returns how many of
	/// the remaining records were renumbered.
	pub fn delete_and_compact(&self, record: &BlockContent) -> CmsResult<usize> {
		let _groups = self.lock_groups();
		self.contents().delete(record)?;
		tracing::debug!(content = ?record.id, page = record.page, block = record.block, "deleted content");
		self.compact(record.page, record.block)
	}

	/// Renumbers `(page, block)` to `0..N` in position order, writing only
	/// records whose position changes.
	pub fn compact(&self, page: u64, block: u32) -> CmsResult<usize> {
		let _groups = self.lock_groups();
		let mut changed = 0;
		for (index, mut record) in self.group(page, block)?.into_iter().enumerate() {
			let position = index as u32;
			if record.position != position {
				record.position = position;
				self.contents().save(&mut record)?;
				changed += 1;
			}
		}
		Ok(changed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::Page;
	use crate::plugins::PluginRegistry;
	use crate::wrappers::WrapperRegistry;
	use rstest::{fixture, rstest};
	use serde_json::json;

	struct Fixture {
		cms: Cms,
		page: Page,
	}

	impl Fixture {
		/// Fills block `block` with `count` text records.
		fn fill(&self, block: u32, count: usize) -> Vec<u64> {
			(0..count)
				.map(|n| {
					self.cms
						.append_content(&self.page, block, "text", &json!({"text": n.to_string()}), "")
						.unwrap()
						.id
						.unwrap()
				})
				.collect()
		}

		fn layout(&self, block: u32) -> Vec<(u32, Option<u64>)> {
			self.cms
				.group(self.page.id.unwrap(), block)
				.unwrap()
				.into_iter()
				.map(|r| (r.position, if r.is_placeholder() { None } else { r.id }))
				.collect()
		}
	}

	#[fixture]
	fn fixture() -> Fixture {
		let cms = Cms::new(PluginRegistry::with_builtin(), WrapperRegistry::new());
		let mut template = crate::models::InnerTemplate::new("two", "{{ content0 }}{{ content1 }}");
		cms.templates().save(&mut template).unwrap();
		let mut page = Page::new("/p/", "P").with_inner_template(&template);
		cms.pages().save(&mut page).unwrap();
		Fixture { cms, page }
	}

	#[rstest]
	fn test_move_after_position_three_from_other_block(fixture: Fixture) {
		// Arrange
		let ids = fixture.fill(0, 5);
		let moved = fixture.fill(1, 1)[0];

		// Act
		let record = fixture.cms.rearrange(moved, Neighbor::After(ids[3])).unwrap();

		// Assert
		assert_eq!((record.block, record.position), (0, 4));
		assert_eq!(
			fixture.layout(0),
			vec![
				(0, Some(ids[0])),
				(1, Some(ids[1])),
				(2, Some(ids[2])),
				(3, Some(ids[3])),
				(4, Some(moved)),
				(5, Some(ids[4])),
				(6, None),
			]
		);
		assert_eq!(fixture.layout(1), vec![(0, None)]);
	}

	#[rstest]
	fn test_move_forward_within_block(fixture: Fixture) {
		let ids = fixture.fill(0, 5);

		let record = fixture.cms.rearrange(ids[0], Neighbor::After(ids[3])).unwrap();

		assert_eq!(record.position, 3);
		assert_eq!(
			fixture.layout(0),
			vec![
				(0, Some(ids[1])),
				(1, Some(ids[2])),
				(2, Some(ids[3])),
				(3, Some(ids[0])),
				(4, Some(ids[4])),
				(5, None),
			]
		);
	}

	#[rstest]
	fn test_move_before_first(fixture: Fixture) {
		let ids = fixture.fill(0, 3);

		let record = fixture.cms.rearrange(ids[2], Neighbor::Before(ids[0])).unwrap();

		assert_eq!(record.position, 0);
		assert_eq!(
			fixture.layout(0),
			vec![(0, Some(ids[2])), (1, Some(ids[0])), (2, Some(ids[1])), (3, None)]
		);
	}

	#[rstest]
	fn test_move_before_placeholder_appends(fixture: Fixture) {
		let ids = fixture.fill(0, 3);
		let placeholder = fixture.cms.group(fixture.page.id.unwrap(), 0).unwrap()[3].id.unwrap();

		fixture.cms.rearrange(ids[0], Neighbor::Before(placeholder)).unwrap();

		assert_eq!(
			fixture.layout(0),
			vec![(0, Some(ids[1])), (1, Some(ids[2])), (2, Some(ids[0])), (3, None)]
		);
	}

	#[rstest]
	fn test_unchanged_position_is_noop(fixture: Fixture) {
		let ids = fixture.fill(0, 3);

		let record = fixture.cms.rearrange(ids[1], Neighbor::After(ids[0])).unwrap();

		assert_eq!(record.position, 1);
		assert_eq!(fixture.layout(0)[..3], [(0, Some(ids[0])), (1, Some(ids[1])), (2, Some(ids[2]))]);
	}

	#[rstest]
	fn test_invalid_moves(fixture: Fixture) {
		// Arrange
		let ids = fixture.fill(0, 2);
		let placeholder = fixture.cms.group(fixture.page.id.unwrap(), 0).unwrap()[2].id.unwrap();
		let mut other_page = Page::new("/q/", "Q");
		fixture.cms.pages().save(&mut other_page).unwrap();
		let foreign = fixture
			.cms
			.append_content(&other_page, 0, "text", &json!({}), "")
			.unwrap()
			.id
			.unwrap();

		// Act / Assert
		for (id, neighbor) in [
			(ids[0], Neighbor::After(ids[0])),
			(placeholder, Neighbor::Before(ids[0])),
			(ids[0], Neighbor::After(placeholder)),
			(foreign, Neighbor::Before(ids[0])),
		] {
			let err = fixture.cms.rearrange(id, neighbor).unwrap_err();
			assert!(matches!(err, CmsError::InvalidMove(_)), "{id} {neighbor:?}: {err}");
		}
	}

	#[rstest]
	fn test_delete_and_compact_skips_unchanged(fixture: Fixture) {
		// Arrange
		let ids = fixture.fill(0, 4);
		let third = fixture.cms.contents().get_by_pk(ids[2]).unwrap();

		// Act
		let changed = fixture.cms.delete_and_compact(&third).unwrap();

		// Assert
		assert_eq!(changed, 2);
		assert_eq!(
			fixture.layout(0),
			vec![(0, Some(ids[0])), (1, Some(ids[1])), (2, Some(ids[3])), (3, None)]
		);
	}
}
