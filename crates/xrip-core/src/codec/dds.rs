//! DDS container header construction.
//!
//! Texture payloads come out of the archive as bare pixel data; writers
//! prepend a DX10-style DDS header so downstream tooling can identify
//! dimensions and format. Always emits the 20-byte DX10 extension with
//! the DXGI format tag.

const MAGIC: u32 = 0x2053_4444; // "DDS "
const FOURCC_DX10: u32 = 0x3031_5844; // "DX10"

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;

const DDPF_FOURCC: u32 = 0x4;

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;

const DDSCAPS2_CUBEMAP_ALL_FACES: u32 = 0xFE00;

const D3D10_RESOURCE_DIMENSION_TEXTURE2D: u32 = 3;
const D3D10_RESOURCE_MISC_TEXTURECUBE: u32 = 0x4;

/// Total header size: magic + 124-byte header + DX10 chunk.
pub const HEADER_LEN: usize = 148;

pub fn build_header(
    width: u32,
    height: u32,
    mip_levels: u32,
    dxgi_format: u8,
    cubemap: bool,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    let mut push = |v: u32| out.extend_from_slice(&v.to_le_bytes());

    let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT;
    let mut caps = DDSCAPS_TEXTURE;
    if mip_levels > 1 {
        flags |= DDSD_MIPMAPCOUNT;
        caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
    }
    if cubemap {
        caps |= DDSCAPS_COMPLEX;
    }

    push(MAGIC);
    push(124); // header size
    push(flags);
    push(height);
    push(width);
    push(0); // pitch/linear size
    push(0); // depth
    push(mip_levels);
    for _ in 0..11 {
        push(0); // reserved
    }
    // DDS_PIXELFORMAT
    push(32);
    push(DDPF_FOURCC);
    push(FOURCC_DX10);
    for _ in 0..5 {
        push(0); // rgb bit counts and masks, unused with DX10
    }
    push(caps);
    push(if cubemap { DDSCAPS2_CUBEMAP_ALL_FACES } else { 0 });
    push(0);
    push(0);
    push(0); // reserved2
    // DX10 extension
    push(dxgi_format as u32);
    push(D3D10_RESOURCE_DIMENSION_TEXTURE2D);
    push(if cubemap { D3D10_RESOURCE_MISC_TEXTURECUBE } else { 0 });
    push(1); // array size (per cube, for cubemaps)
    push(0); // misc flags 2

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_header_layout() {
        let h = build_header(1024, 512, 5, 98, false);
        assert_eq!(h.len(), HEADER_LEN);
        assert_eq!(&h[..4], b"DDS ");
        assert_eq!(u32_at(&h, 4), 124);
        assert_eq!(u32_at(&h, 12), 512); // height
        assert_eq!(u32_at(&h, 16), 1024); // width
        assert_eq!(u32_at(&h, 28), 5); // mip count
        assert_eq!(u32_at(&h, 84), 0x3031_5844); // "DX10"
        assert_eq!(u32_at(&h, 128), 98); // DXGI format
        assert_ne!(u32_at(&h, 8) & DDSD_MIPMAPCOUNT, 0);
    }

    #[test]
    fn test_cubemap_flags() {
        let h = build_header(256, 256, 1, 28, true);
        assert_eq!(u32_at(&h, 8) & DDSD_MIPMAPCOUNT, 0);
        assert_eq!(u32_at(&h, 112), DDSCAPS2_CUBEMAP_ALL_FACES);
        assert_eq!(u32_at(&h, 136), D3D10_RESOURCE_MISC_TEXTURECUBE);
    }
}
