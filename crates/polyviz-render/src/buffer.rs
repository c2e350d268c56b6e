//! GPU buffer and texture helpers for the wgpu engine.

use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};
use crate::types::{RenderDataType, TextureData};

/// Smallest buffer the engine allocates, so that empty arrays still bind.
pub const MIN_BUFFER_SIZE: usize = 16;

/// Converts tightly packed host elements to storage array layout.
///
/// Only three-component vectors differ: each gets four bytes of padding.
pub fn pad_to_storage(bytes: &[u8], data_type: RenderDataType, len: usize) -> Vec<u8> {
    let host = data_type.host_size();
    let stride = data_type.storage_stride();
    if host == stride {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; len * stride];
    for (src, dst) in bytes.chunks_exact(host).zip(out.chunks_exact_mut(stride)) {
        dst[..host].copy_from_slice(src);
    }
    out
}

/// Inverse of [`pad_to_storage`].
pub fn unpad_from_storage(bytes: &[u8], data_type: RenderDataType, len: usize) -> Vec<u8> {
    let host = data_type.host_size();
    let stride = data_type.storage_stride();
    if host == stride {
        return bytes[..len * host].to_vec();
    }
    bytes
        .chunks_exact(stride)
        .take(len)
        .flat_map(|chunk| chunk[..host].iter().copied())
        .collect()
}

fn with_min_size(contents: &[u8]) -> Vec<u8> {
    let mut bytes = contents.to_vec();
    if bytes.len() < MIN_BUFFER_SIZE {
        bytes.resize(MIN_BUFFER_SIZE, 0);
    }
    bytes
}

/// Creates a storage buffer that can also be written and copied from.
pub fn create_storage_buffer(
    device: &wgpu::Device,
    contents: &[u8],
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: &with_min_size(contents),
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
    })
}

/// Creates a uniform buffer from packed bytes.
pub fn create_uniform_buffer(
    device: &wgpu::Device,
    contents: &[u8],
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: &with_min_size(contents),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Copies the first `size` bytes of `buffer` into host memory.
pub fn read_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    size: u64,
) -> RenderResult<Vec<u8>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    map_and_copy(device, &staging)
}

/// Maps a `MAP_READ` buffer and copies its contents out.
pub fn map_and_copy(device: &wgpu::Device, staging: &wgpu::Buffer) -> RenderResult<Vec<u8>> {
    let buffer_slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::wait_indefinitely());
    rx.recv()
        .map_err(|e| RenderError::ReadbackFailed(e.to_string()))?
        .map_err(|e| RenderError::ReadbackFailed(e.to_string()))?;

    let data = buffer_slice.get_mapped_range();
    let bytes = data.to_vec();
    drop(data);
    staging.unmap();
    Ok(bytes)
}

/// Uploads host texels as an `Rgba16Float` texture.
pub fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    data: &TextureData,
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    // f32 -> f16 for upload
    let half_data: Vec<u16> = data
        .texels
        .iter()
        .flat_map(|t| t.to_array())
        .map(|v| half::f16::from_f32(v).to_bits())
        .collect();

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&half_data),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(data.width * 4 * 2), // 4 channels * 2 bytes per f16
            rows_per_image: Some(data.height),
        },
        size,
    );

    texture
}

/// Linear filtering sampler with clamped edges.
pub fn create_linear_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("linear clamp sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn test_vec3_padding() {
        let data = [Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)];
        let bytes: &[u8] = bytemuck::cast_slice(&data);

        let padded = pad_to_storage(bytes, RenderDataType::Vector3Float, 2);
        assert_eq!(padded.len(), 32);
        let floats: Vec<f32> = padded
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(floats, vec![1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0]);

        let unpadded = unpad_from_storage(&padded, RenderDataType::Vector3Float, 2);
        assert_eq!(unpadded, bytes);
    }

    #[test]
    fn test_scalars_are_not_padded() {
        let data = [1.0_f32, 2.0, 3.0];
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        assert_eq!(pad_to_storage(bytes, RenderDataType::Float, 3), bytes);

        // Trailing allocation slack is cut off on the way back.
        let mut padded = bytes.to_vec();
        padded.resize(MIN_BUFFER_SIZE, 0);
        assert_eq!(unpad_from_storage(&padded, RenderDataType::Float, 3), bytes);
    }
}
