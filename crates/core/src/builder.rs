//! Editor shell owning a page's ordered block list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::blocks::render::{render_blocks, RenderOptions};
use crate::blocks::{ensure_unique_ids, Block, BlockId, BlockKind, BlockListError};

/// Pointer travel required before a pressed block starts dragging.
pub const DRAG_ACTIVATION_DISTANCE: f64 = 8.0;

const PALETTE: &[BlockKind] = &BlockKind::ALL;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditorMode {
    #[default]
    Edit,
    Preview,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DragPoint {
    pub x: f64,
    pub y: f64,
}

impl DragPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(&self, other: &DragPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct DragState {
    block_id: BlockId,
    origin: DragPoint,
    active: bool,
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("invalid page JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidBlockList(#[from] BlockListError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("saving blocks failed: {0}")]
pub struct BlockSinkError(pub String);

/// Receives the block list when the builder saves.
#[async_trait]
pub trait BlockSink: Send + Sync {
    async fn save_blocks(&self, blocks: &[Block]) -> Result<(), BlockSinkError>;
}

#[derive(Clone, Debug, Default)]
pub struct PageBuilder {
    blocks: Vec<Block>,
    mode: EditorMode,
    drag: Option<DragState>,
}

impl PageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(blocks: Vec<Block>) -> Result<Self, BuilderError> {
        ensure_unique_ids(&blocks)?;
        Ok(Self { blocks, ..Self::default() })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EditorMode) {
        self.mode = mode;
        if mode == EditorMode::Preview {
            self.drag = None;
        }
    }

    pub fn toggle_mode(&mut self) -> EditorMode {
        let next = match self.mode {
            EditorMode::Edit => EditorMode::Preview,
            EditorMode::Preview => EditorMode::Edit,
        };
        self.set_mode(next);
        next
    }

    /// Block kinds offered by the sidebar; empty in preview.
    pub fn palette(&self) -> &'static [BlockKind] {
        match self.mode {
            EditorMode::Edit => PALETTE,
            EditorMode::Preview => &[],
        }
    }

    /// Appends a block of `kind` with default content and returns it.
    pub fn add_block(&mut self, kind: BlockKind) -> &Block {
        let mut block = Block::with_defaults(kind);
        while self.position(&block.id).is_some() {
            block.id = BlockId::generate();
        }
        self.blocks.push(block);
        &self.blocks[self.blocks.len() - 1]
    }

    /// Replaces the block with the same id. Returns false when absent.
    pub fn update_block(&mut self, updated: Block) -> bool {
        match self.position(&updated.id) {
            Some(index) => {
                self.blocks[index] = updated;
                true
            }
            None => false,
        }
    }

    pub fn delete_block(&mut self, id: &BlockId) -> bool {
        let before = self.blocks.len();
        self.blocks.retain(|block| &block.id != id);
        self.blocks.len() != before
    }

    pub fn move_block_up(&mut self, id: &BlockId) -> bool {
        match self.position(id) {
            Some(index) if index > 0 => {
                self.blocks.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn move_block_down(&mut self, id: &BlockId) -> bool {
        match self.position(id) {
            Some(index) if index + 1 < self.blocks.len() => {
                self.blocks.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Presses on a block. Nothing moves until [`PageBuilder::drag_to`] passes
    /// the activation distance.
    pub fn begin_drag(&mut self, id: &BlockId, point: DragPoint) -> bool {
        if self.mode != EditorMode::Edit || self.position(id).is_none() {
            return false;
        }
        self.drag = Some(DragState { block_id: id.clone(), origin: point, active: false });
        true
    }

    /// Returns whether the drag is active after the move.
    pub fn drag_to(&mut self, point: DragPoint) -> bool {
        match self.drag.as_mut() {
            Some(drag) => {
                if !drag.active && drag.origin.distance_to(&point) >= DRAG_ACTIVATION_DISTANCE {
                    drag.active = true;
                }
                drag.active
            }
            None => false,
        }
    }

    /// The block following the pointer while a drag is active.
    pub fn drag_ghost(&self) -> Option<&Block> {
        let drag = self.drag.as_ref().filter(|drag| drag.active)?;
        self.position(&drag.block_id).map(|index| &self.blocks[index])
    }

    /// Releases the pointer. Dropping an active drag over another block moves
    /// the dragged block to that block's index.
    pub fn end_drag(&mut self, over: Option<&BlockId>) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if !drag.active {
            return false;
        }
        let Some(target) = over.filter(|target| **target != drag.block_id) else {
            return false;
        };

        match (self.position(&drag.block_id), self.position(target)) {
            (Some(from), Some(to)) => {
                let block = self.blocks.remove(from);
                self.blocks.insert(to, block);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn export_json(&self) -> Result<String, BuilderError> {
        Ok(serde_json::to_string_pretty(&self.blocks)?)
    }

    pub fn export_file_name(now: DateTime<Utc>) -> String {
        format!("page-{}.json", now.timestamp_millis())
    }

    /// Replaces the list wholesale. On error the current list is untouched.
    pub fn import_json(&mut self, text: &str) -> Result<usize, BuilderError> {
        let blocks: Vec<Block> = serde_json::from_str(text)?;
        ensure_unique_ids(&blocks)?;
        self.blocks = blocks;
        self.drag = None;
        Ok(self.blocks.len())
    }

    pub async fn save(&self, sink: &dyn BlockSink) -> Result<(), BlockSinkError> {
        sink.save_blocks(&self.blocks).await
    }

    /// Edit mode renders controls; preview renders exactly as the public page.
    pub fn render(&self, options: &RenderOptions) -> String {
        render_blocks(&self.blocks, self.mode == EditorMode::Edit, options)
    }

    fn position(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| &block.id == id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::{BlockSink, BlockSinkError, BuilderError, DragPoint, EditorMode, PageBuilder};
    use crate::blocks::render::RenderOptions;
    use crate::blocks::{Block, BlockContent, BlockId, BlockKind, HeadingContent, HeadingLevel};

    fn builder_with(count: usize) -> (PageBuilder, Vec<BlockId>) {
        let mut builder = PageBuilder::new();
        let ids =
            (0..count).map(|_| builder.add_block(BlockKind::Text).id.clone()).collect::<Vec<_>>();
        (builder, ids)
    }

    fn order(builder: &PageBuilder) -> Vec<BlockId> {
        builder.blocks().iter().map(|block| block.id.clone()).collect()
    }

    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl BlockSink for RecordingSink {
        async fn save_blocks(&self, blocks: &[Block]) -> Result<(), BlockSinkError> {
            self.saved.lock().expect("lock").push(blocks.len());
            Ok(())
        }
    }

    #[test]
    fn add_block_appends_default_content_with_fresh_id() {
        let mut builder = PageBuilder::new();
        for (count, kind) in BlockKind::ALL.into_iter().enumerate() {
            let added = builder.add_block(kind).clone();
            assert_eq!(builder.blocks().len(), count + 1);
            assert_eq!(added.content, BlockContent::default_for(kind));
            assert_eq!(builder.blocks().last(), Some(&added));
        }

        let mut ids = order(&builder);
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();
        assert_eq!(ids.len(), BlockKind::ALL.len());
    }

    #[test]
    fn update_block_is_idempotent_and_ignores_unknown_ids() {
        let (mut builder, ids) = builder_with(2);
        let updated = Block::new(
            ids[1].clone(),
            BlockContent::Heading(HeadingContent {
                text: "Same-day install".to_string(),
                level: HeadingLevel::H1,
            }),
        );

        assert!(builder.update_block(updated.clone()));
        let once = builder.blocks().to_vec();
        assert!(builder.update_block(updated));
        assert_eq!(builder.blocks(), once.as_slice());

        let stranger = Block::with_defaults(BlockKind::Spacer);
        assert!(!builder.update_block(stranger));
        assert_eq!(builder.blocks(), once.as_slice());
    }

    #[test]
    fn second_delete_is_a_no_op() {
        let (mut builder, ids) = builder_with(3);
        assert!(builder.delete_block(&ids[1]));
        let after_first = order(&builder);
        assert!(!builder.delete_block(&ids[1]));
        assert_eq!(order(&builder), after_first);
        assert_eq!(after_first, vec![ids[0].clone(), ids[2].clone()]);
    }

    #[test]
    fn moves_are_no_ops_at_boundaries_and_reversible_inside() {
        let (mut builder, ids) = builder_with(3);

        assert!(!builder.move_block_up(&ids[0]));
        assert!(!builder.move_block_down(&ids[2]));
        assert_eq!(order(&builder), ids);

        assert!(builder.move_block_up(&ids[1]));
        assert_eq!(order(&builder), vec![ids[1].clone(), ids[0].clone(), ids[2].clone()]);
        assert!(builder.move_block_down(&ids[1]));
        assert_eq!(order(&builder), ids);
    }

    #[test]
    fn drag_activates_after_eight_pixels_and_moves_to_target_index() {
        let (mut builder, ids) = builder_with(4);

        assert!(builder.begin_drag(&ids[0], DragPoint::new(10.0, 10.0)));
        assert!(!builder.drag_to(DragPoint::new(13.0, 14.0)));
        assert!(builder.drag_ghost().is_none());
        assert!(builder.drag_to(DragPoint::new(10.0, 18.0)));
        assert_eq!(builder.drag_ghost().map(|block| &block.id), Some(&ids[0]));

        assert!(builder.end_drag(Some(&ids[2])));
        assert_eq!(
            order(&builder),
            vec![ids[1].clone(), ids[2].clone(), ids[0].clone(), ids[3].clone()]
        );
        assert!(builder.drag_ghost().is_none());
    }

    #[test]
    fn short_press_does_not_reorder() {
        let (mut builder, ids) = builder_with(2);
        builder.begin_drag(&ids[0], DragPoint::new(0.0, 0.0));
        builder.drag_to(DragPoint::new(3.0, 3.0));
        assert!(!builder.end_drag(Some(&ids[1])));
        assert_eq!(order(&builder), ids);
    }

    #[test]
    fn export_then_import_reproduces_every_variant() {
        let mut builder = PageBuilder::new();
        for kind in BlockKind::ALL {
            builder.add_block(kind);
        }
        let exported = builder.export_json().expect("export");
        assert!(exported.starts_with("[\n"));

        let mut restored = PageBuilder::new();
        assert_eq!(restored.import_json(&exported).expect("import"), BlockKind::ALL.len());
        assert_eq!(restored.blocks(), builder.blocks());
    }

    #[test]
    fn failed_import_leaves_state_untouched() {
        let (mut builder, ids) = builder_with(2);

        assert!(matches!(builder.import_json("[{\"id\": "), Err(BuilderError::InvalidJson(_))));
        let duplicate = r#"[
            {"id": "a", "type": "spacer", "content": {"height": 10}},
            {"id": "a", "type": "spacer", "content": {"height": 20}}
        ]"#;
        assert!(matches!(builder.import_json(duplicate), Err(BuilderError::InvalidBlockList(_))));
        assert_eq!(order(&builder), ids);
    }

    #[test]
    fn export_file_name_uses_millis() {
        let now = Utc.timestamp_millis_opt(1_760_000_000_123).single().expect("timestamp");
        assert_eq!(PageBuilder::export_file_name(now), "page-1760000000123.json");
    }

    #[test]
    fn preview_mode_hides_controls_and_palette() {
        let (mut builder, ids) = builder_with(1);
        assert!(builder.render(&RenderOptions::default()).contains("block-controls"));
        assert_eq!(builder.palette().len(), BlockKind::ALL.len());

        assert_eq!(builder.toggle_mode(), EditorMode::Preview);
        assert!(!builder.render(&RenderOptions::default()).contains("block-controls"));
        assert!(builder.palette().is_empty());
        assert!(!builder.begin_drag(&ids[0], DragPoint::default()));
    }

    #[tokio::test]
    async fn save_hands_current_list_to_sink() {
        let (builder, _) = builder_with(3);
        let sink = RecordingSink::default();
        builder.save(&sink).await.expect("save");
        assert_eq!(*sink.saved.lock().expect("lock"), vec![3]);
    }
}
