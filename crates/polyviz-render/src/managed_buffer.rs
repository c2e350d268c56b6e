//! Host/device buffer pairs with lazy synchronization.
//!
//! A [`ManagedBuffer`] holds a host copy and, once drawn, a device copy of the same
//! array. After every write exactly one side is authoritative:
//! - host writes go through [`ManagedBuffer::set_data`] or
//!   [`ManagedBuffer::data_mut`] followed by [`ManagedBuffer::mark_host_buffer_updated`],
//!   and the device copy is refreshed on the next bind
//! - device writes are announced with [`ManagedBuffer::mark_render_buffer_updated`],
//!   and the host copy is read back on the next host access
//!
//! Nothing is tracked implicitly. Forgetting to mark a change means the other side
//! keeps its stale contents.

use std::sync::Arc;

use crate::engine::{next_buffer_id, AttributeBuffer, Engine};
use crate::error::{RenderError, RenderResult};
use crate::types::BufferElement;

/// A device buffer holding `values[indices[i]]`, cached per index buffer.
struct IndexedView {
    index_id: u64,
    value_version: u64,
    index_version: u64,
    buffer: Arc<dyn AttributeBuffer>,
}

/// A named array of `T` kept in sync between host and device.
pub struct ManagedBuffer<T: BufferElement> {
    id: u64,
    name: String,
    data: Vec<T>,
    /// Host copy is stale.
    host_dirty: bool,
    /// Device copy is stale.
    device_dirty: bool,
    render_buffer: Option<Arc<dyn AttributeBuffer>>,
    version: u64,
    indexed_views: Vec<IndexedView>,
}

impl<T: BufferElement> ManagedBuffer<T> {
    /// Creates a host-authoritative buffer.
    pub fn new(name: impl Into<String>, data: Vec<T>) -> Self {
        Self {
            id: next_buffer_id(),
            name: name.into(),
            data,
            host_dirty: false,
            device_dirty: true,
            render_buffer: None,
            version: 1,
            indexed_views: Vec::new(),
        }
    }

    /// Wraps an existing device buffer. The host copy is read back on first access.
    pub fn from_render_buffer(
        name: impl Into<String>,
        buffer: Arc<dyn AttributeBuffer>,
    ) -> RenderResult<Self> {
        let name = name.into();
        if buffer.data_type() != T::DATA_TYPE {
            return Err(RenderError::AttributeTypeMismatch {
                name,
                expected: T::DATA_TYPE,
                actual: buffer.data_type(),
            });
        }
        Ok(Self {
            id: next_buffer_id(),
            name,
            data: Vec::new(),
            host_dirty: true,
            device_dirty: false,
            render_buffer: Some(buffer),
            version: 1,
            indexed_views: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique id, used to key indexed views.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bumped on every marked change from either side.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of elements on the authoritative side.
    pub fn len(&self) -> usize {
        match (&self.render_buffer, self.host_dirty) {
            (Some(buffer), true) => buffer.len(),
            _ => self.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_render_buffer(&self) -> bool {
        self.render_buffer.is_some()
    }

    /// True when the host copy is current.
    pub fn is_host_populated(&self) -> bool {
        !self.host_dirty
    }

    /// True when the device copy exists and is current.
    pub fn is_device_current(&self) -> bool {
        self.render_buffer.is_some() && !self.device_dirty
    }

    /// Reads the device copy back if the host copy is stale.
    pub fn ensure_host_buffer_populated(&mut self) -> RenderResult<()> {
        if !self.host_dirty {
            return Ok(());
        }
        let buffer = self
            .render_buffer
            .as_ref()
            .ok_or_else(|| RenderError::BufferNotPopulated(self.name.clone()))?;
        self.data = buffer.read::<T>()?;
        self.host_dirty = false;
        log::debug!("read back {} elements of {}", self.data.len(), self.name);
        Ok(())
    }

    /// Declares the host copy authoritative after an edit via [`Self::data_mut`].
    pub fn mark_host_buffer_updated(&mut self) {
        self.host_dirty = false;
        self.device_dirty = true;
        self.version += 1;
    }

    /// Declares the device copy authoritative after GPU work wrote to it.
    pub fn mark_render_buffer_updated(&mut self) {
        self.host_dirty = true;
        self.device_dirty = false;
        self.version += 1;
    }

    /// Host copy as last populated. Call [`Self::ensure_host_buffer_populated`]
    /// first if the device may have been written.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable host copy. Follow edits with [`Self::mark_host_buffer_updated`].
    pub fn data_mut(&mut self) -> RenderResult<&mut Vec<T>> {
        self.ensure_host_buffer_populated()?;
        Ok(&mut self.data)
    }

    /// Reads one element, pulling the host copy first if needed.
    pub fn get_value(&mut self, index: usize) -> RenderResult<T> {
        self.ensure_host_buffer_populated()?;
        self.data
            .get(index)
            .copied()
            .ok_or_else(|| RenderError::IndexOutOfRange {
                buffer: self.name.clone(),
                index,
                len: self.data.len(),
            })
    }

    /// Replaces the host contents and marks them authoritative.
    pub fn set_data(&mut self, data: Vec<T>) {
        self.data = data;
        self.mark_host_buffer_updated();
    }

    /// Device buffer for binding, created and uploaded as needed.
    ///
    /// Uploads only when the device copy is stale.
    pub fn get_render_attribute_buffer(
        &mut self,
        engine: &mut dyn Engine,
    ) -> RenderResult<Arc<dyn AttributeBuffer>> {
        let buffer = match &self.render_buffer {
            Some(buffer) => Arc::clone(buffer),
            None => {
                let buffer = engine.generate_attribute_buffer(T::DATA_TYPE, &self.name);
                self.render_buffer = Some(Arc::clone(&buffer));
                self.device_dirty = true;
                buffer
            }
        };

        if self.device_dirty {
            buffer.write(&self.data)?;
            self.device_dirty = false;
            log::debug!("uploaded {} elements of {}", self.data.len(), self.name);
        }
        Ok(buffer)
    }

    /// Device buffer holding `self[indices[i]]` for every `i`.
    ///
    /// The gathered buffer is cached per index buffer and rebuilt only after either
    /// buffer changed version.
    pub fn get_indexed_render_attribute_buffer(
        &mut self,
        engine: &mut dyn Engine,
        indices: &mut ManagedBuffer<u32>,
    ) -> RenderResult<Arc<dyn AttributeBuffer>> {
        let slot = self
            .indexed_views
            .iter()
            .position(|v| v.index_id == indices.id());
        if let Some(i) = slot {
            let view = &self.indexed_views[i];
            if view.value_version == self.version && view.index_version == indices.version() {
                return Ok(Arc::clone(&view.buffer));
            }
        }

        self.ensure_host_buffer_populated()?;
        indices.ensure_host_buffer_populated()?;

        let gathered = indices
            .data()
            .iter()
            .map(|&index| {
                self.data
                    .get(index as usize)
                    .copied()
                    .ok_or_else(|| RenderError::IndexOutOfRange {
                        buffer: self.name.clone(),
                        index: index as usize,
                        len: self.data.len(),
                    })
            })
            .collect::<RenderResult<Vec<T>>>()?;

        let buffer = match slot {
            Some(i) => Arc::clone(&self.indexed_views[i].buffer),
            None => engine.generate_attribute_buffer(
                T::DATA_TYPE,
                &format!("{} [{}]", self.name, indices.name()),
            ),
        };
        buffer.write(&gathered)?;

        let view = IndexedView {
            index_id: indices.id(),
            value_version: self.version,
            index_version: indices.version(),
            buffer: Arc::clone(&buffer),
        };
        match slot {
            Some(i) => self.indexed_views[i] = view,
            None => self.indexed_views.push(view),
        }
        Ok(buffer)
    }

    /// Drops the device copy and all indexed views. The host copy is pulled first
    /// so no data is lost.
    pub fn release_render_buffers(&mut self) -> RenderResult<()> {
        self.ensure_host_buffer_populated()?;
        self.render_buffer = None;
        self.indexed_views.clear();
        self.device_dirty = true;
        Ok(())
    }
}

impl<T: BufferElement> std::fmt::Debug for ManagedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBuffer")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("host_dirty", &self.host_dirty)
            .field("device_dirty", &self.device_dirty)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use proptest::prelude::*;

    use super::*;
    use crate::mock_engine::MockEngine;
    use crate::types::RenderDataType;

    #[test]
    fn test_binding_twice_uploads_once() {
        let mut engine = MockEngine::new();
        let mut buf = ManagedBuffer::new("values", vec![1.0_f32, 2.0, 3.0]);

        let before = engine.stats();
        let a = buf.get_render_attribute_buffer(&mut engine).unwrap();
        let b = buf.get_render_attribute_buffer(&mut engine).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.stats().since(&before).buffer_uploads, 1);
        assert_eq!(engine.stats().since(&before).buffers_created, 1);

        buf.set_data(vec![4.0, 5.0]);
        let c = buf.get_render_attribute_buffer(&mut engine).unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(c.read::<f32>().unwrap(), vec![4.0, 5.0]);
        assert_eq!(engine.stats().since(&before).buffer_uploads, 2);
    }

    #[test]
    fn test_ensure_host_twice_reads_back_once() {
        let mut engine = MockEngine::new();
        let device = engine.generate_attribute_buffer(RenderDataType::Vector3Float, "gpu");
        device.write(&[Vec3::X, Vec3::Y]).unwrap();

        let mut buf = ManagedBuffer::<Vec3>::from_render_buffer("gpu", device).unwrap();
        assert!(!buf.is_host_populated());
        assert_eq!(buf.len(), 2);

        let before = engine.stats();
        buf.ensure_host_buffer_populated().unwrap();
        buf.ensure_host_buffer_populated().unwrap();
        assert_eq!(buf.get_value(1).unwrap(), Vec3::Y);
        assert_eq!(engine.stats().since(&before).buffer_readbacks, 1);
    }

    #[test]
    fn test_device_write_then_host_read() {
        let mut engine = MockEngine::new();
        let mut buf = ManagedBuffer::new("values", vec![0.0_f32; 3]);
        let device = buf.get_render_attribute_buffer(&mut engine).unwrap();

        device.write(&[7.0_f32, 8.0, 9.0]).unwrap();
        buf.mark_render_buffer_updated();
        assert_eq!(buf.get_value(2).unwrap(), 9.0);

        // The device copy is authoritative, so binding does not re-upload.
        let before = engine.stats();
        buf.get_render_attribute_buffer(&mut engine).unwrap();
        assert_eq!(engine.stats().since(&before).buffer_uploads, 0);
    }

    #[test]
    fn test_data_mut_then_mark_is_visible() {
        let mut buf = ManagedBuffer::new("values", vec![1_u32, 2, 3]);
        let version = buf.version();
        buf.data_mut().unwrap()[1] = 42;
        buf.mark_host_buffer_updated();
        assert_eq!(buf.get_value(1).unwrap(), 42);
        assert!(buf.version() > version);
    }

    #[test]
    fn test_unpopulated_and_out_of_range() {
        let mut engine = MockEngine::new();
        let device = engine.generate_attribute_buffer(RenderDataType::Float, "gpu");
        let mut buf = ManagedBuffer::<f32>::from_render_buffer("gpu", device).unwrap();
        buf.ensure_host_buffer_populated().unwrap();
        assert!(matches!(
            buf.get_value(0),
            Err(RenderError::IndexOutOfRange { index: 0, len: 0, .. })
        ));

        let wrong = engine.generate_attribute_buffer(RenderDataType::UInt, "gpu");
        assert!(ManagedBuffer::<f32>::from_render_buffer("gpu", wrong).is_err());
    }

    #[test]
    fn test_indexed_view_is_cached_per_version() {
        let mut engine = MockEngine::new();
        let mut values = ManagedBuffer::new("values", vec![10.0_f32, 20.0, 30.0]);
        let mut indices = ManagedBuffer::new("indices", vec![2_u32, 0, 2]);

        let view = values
            .get_indexed_render_attribute_buffer(&mut engine, &mut indices)
            .unwrap();
        assert_eq!(view.read::<f32>().unwrap(), vec![30.0, 10.0, 30.0]);

        let before = engine.stats();
        let again = values
            .get_indexed_render_attribute_buffer(&mut engine, &mut indices)
            .unwrap();
        assert!(Arc::ptr_eq(&view, &again));
        assert_eq!(engine.stats().since(&before).buffer_uploads, 0);

        indices.set_data(vec![1, 1]);
        let rebuilt = values
            .get_indexed_render_attribute_buffer(&mut engine, &mut indices)
            .unwrap();
        assert!(Arc::ptr_eq(&view, &rebuilt));
        assert_eq!(rebuilt.read::<f32>().unwrap(), vec![20.0, 20.0]);

        values.data_mut().unwrap()[1] = 25.0;
        values.mark_host_buffer_updated();
        let rebuilt = values
            .get_indexed_render_attribute_buffer(&mut engine, &mut indices)
            .unwrap();
        assert_eq!(rebuilt.read::<f32>().unwrap(), vec![25.0, 25.0]);
    }

    #[test]
    fn test_indexed_view_rejects_bad_index() {
        let mut engine = MockEngine::new();
        let mut values = ManagedBuffer::new("values", vec![1.0_f32, 2.0]);
        let mut indices = ManagedBuffer::new("indices", vec![0_u32, 5]);
        let Err(err) = values.get_indexed_render_attribute_buffer(&mut engine, &mut indices)
        else {
            panic!("index 5 is out of range for two values");
        };
        assert!(matches!(err, RenderError::IndexOutOfRange { index: 5, len: 2, .. }));
    }

    proptest! {
        #[test]
        fn prop_device_round_trip(data in prop::collection::vec(-1.0e6_f32..1.0e6, 0..64)) {
            let mut engine = MockEngine::new();
            let mut buf = ManagedBuffer::new("values", data.clone());
            let device = buf.get_render_attribute_buffer(&mut engine).unwrap();

            let mut copy = ManagedBuffer::<f32>::from_render_buffer("copy", device).unwrap();
            copy.ensure_host_buffer_populated().unwrap();
            prop_assert_eq!(copy.data(), data.as_slice());
        }
    }
}
