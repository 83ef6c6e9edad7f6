use image::{DynamicImage, GenericImageView};

use crate::error::TilingError;

/// Placement of one tile inside its parent image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    /// Position in row-major scan order
    pub index: usize,
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
    /// Smaller than the nominal size at the right/bottom edge when it does not divide evenly
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub fn offset(&self) -> (u32, u32) {
        (self.x, self.y)
    }
}

/// Owned pixels of one tile plus its placement
#[derive(Debug, Clone)]
pub struct Tile {
    pub rect: TileRect,
    pub image: DynamicImage,
}

pub fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Partitions an image into square windows in row-major order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileScheduler {
    size: u32,
}

impl TileScheduler {
    pub fn new(size: u32) -> Result<Self, TilingError> {
        if size == 0 {
            return Err(TilingError::InvalidTileSize);
        }
        Ok(Self { size })
    }

    /// Largest tile size that partitions the image exactly: gcd(width, height)
    pub fn optimal_for(width: u32, height: u32) -> Result<Self, TilingError> {
        if width == 0 || height == 0 {
            return Err(TilingError::EmptyImage);
        }
        Self::new(gcd(width, height))
    }

    /// Caller-supplied size if given, otherwise the gcd of the image dimensions
    pub fn for_image(image: &DynamicImage, size: Option<u32>) -> Result<Self, TilingError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(TilingError::EmptyImage);
        }
        match size {
            Some(size) => Self::new(size),
            None => Self::optimal_for(width, height),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// (rows, cols) for an image of the given dimensions
    pub fn grid(&self, width: u32, height: u32) -> (u32, u32) {
        (height.div_ceil(self.size), width.div_ceil(self.size))
    }

    /// Tile placements only; pure function of the dimensions and the size
    pub fn plan(&self, width: u32, height: u32) -> impl Iterator<Item = TileRect> + use<> {
        let size = self.size;
        let (rows, cols) = self.grid(width, height);

        (0..rows).flat_map(move |row| {
            (0..cols).map(move |col| {
                let x = col * size;
                let y = row * size;
                TileRect {
                    index: (row * cols + col) as usize,
                    row,
                    col,
                    x,
                    y,
                    width: size.min(width - x),
                    height: size.min(height - y),
                }
            })
        })
    }

    /// Cropped tiles in scan order. Restartable: calling again yields the same sequence.
    pub fn tiles<'a>(&self, image: &'a DynamicImage) -> impl Iterator<Item = Tile> + use<'a> {
        let (width, height) = image.dimensions();
        self.plan(width, height).map(move |rect| Tile {
            rect,
            image: image.crop_imm(rect.x, rect.y, rect.width, rect.height),
        })
    }
}
