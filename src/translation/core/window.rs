//! 窗口状态
//!
//! 每个顶层窗口一份状态，首次访问时创建，窗口关闭时显式移除。窗口标识
//! 使用代际索引，关闭后复用的槽位不会被旧标识访问到。

use std::sync::{Mutex, PoisonError};

use crate::translation::storage::records::LanguagePair;

/// 窗口标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId {
    index: u32,
    generation: u32,
}

/// 窗口级翻译状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowState {
    /// 页面重新加载后直接翻译的语言对
    pub translate_on_page_reload: Option<LanguagePair>,
    /// 页面刚被还原，下一次检测不自动翻译
    pub is_page_restored: bool,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    open: bool,
    state: Option<WindowState>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Arena {
    fn slot_mut(&mut self, id: WindowId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.open && slot.generation == id.generation)
    }
}

/// 窗口状态注册表
#[derive(Debug, Default)]
pub struct WindowRegistry {
    arena: Mutex<Arena>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_window(&self) -> WindowId {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = arena.free.pop() {
            let slot = &mut arena.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.open = true;
            slot.state = None;
            return WindowId {
                index,
                generation: slot.generation,
            };
        }

        let index = arena.slots.len() as u32;
        arena.slots.push(Slot {
            generation: 0,
            open: true,
            state: None,
        });
        WindowId { index, generation: 0 }
    }

    /// 关闭窗口并丢弃其状态
    pub fn close_window(&self, id: WindowId) -> bool {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        let closed = match arena.slot_mut(id) {
            Some(slot) => {
                slot.open = false;
                slot.state = None;
                true
            }
            None => false,
        };
        if closed {
            arena.free.push(id.index);
            tracing::debug!("窗口 {:?} 已关闭", id);
        }
        closed
    }

    pub fn is_open(&self, id: WindowId) -> bool {
        self.arena
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slot_mut(id)
            .is_some()
    }

    /// 访问窗口状态，必要时创建；窗口已关闭时返回 `None`
    pub fn with_state<R, F>(&self, id: WindowId, f: F) -> Option<R>
    where
        F: FnOnce(&mut WindowState) -> R,
    {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = arena.slot_mut(id)?;
        Some(f(slot.state.get_or_insert_with(WindowState::default)))
    }

    pub fn open_count(&self) -> usize {
        self.arena
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .iter()
            .filter(|slot| slot.open)
            .count()
    }
}
