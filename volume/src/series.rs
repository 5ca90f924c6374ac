//! Series assembly: enumerate, validate, order, and pack slices.

use crate::progress::{CancelToken, ProgressSink, VolumeShape};
use crate::volume::Volume;
use crate::{
    CancelledSnafu, EmptySeriesSnafu, Error, FailedToDecodeSnafu, InconsistencyKind,
    InconsistentSnafu, MultiFrameSnafu, OpenSliceSnafu, UnsupportedPixelShapeSnafu,
};
use snafu::{ensure, ResultExt};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use voxel_core::{ImageInfo, PixelBuffer, Vector3};
use voxel_object::FileDecoder;
use voxel_pixeldata::PixelDecode;
use walkdir::{DirEntry, WalkDir};

/// Orientation vectors may differ by at most this much across a series.
const ORIENTATION_TOLERANCE: f64 = 1e-4;
/// Computed and tagged slice spacing may disagree by at most this many
/// millimetres before the tag wins.
const Z_SPACING_TOLERANCE_MM: f64 = 0.2;

/// A source of decoded slices, injectable for testing.
///
/// The production implementation is [`FileSliceDecoder`]; tests provide
/// fakes that serve canned geometry and pixels.
pub trait SliceDecoder: Sized + Send {
    /// Open the file at `path` and parse its header.
    fn open(path: &Path) -> Result<Self, Error>;

    /// The image attributes of this slice.
    fn info(&self) -> &ImageInfo;

    /// Decode the slice into normalized unsigned 16-bit samples.
    fn decode_slice(&mut self) -> Result<Vec<u16>, Error>;
}

/// The production slice decoder, backed by [`FileDecoder`].
#[derive(Debug)]
pub struct FileSliceDecoder {
    inner: FileDecoder,
}

impl SliceDecoder for FileSliceDecoder {
    fn open(path: &Path) -> Result<Self, Error> {
        let inner = FileDecoder::from_path(path).context(OpenSliceSnafu {
            path: path.to_path_buf(),
        })?;
        Ok(FileSliceDecoder { inner })
    }

    fn info(&self) -> &ImageInfo {
        self.inner.image_info()
    }

    fn decode_slice(&mut self) -> Result<Vec<u16>, Error> {
        let path = self
            .inner
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        match self.inner.decode_pixel_data() {
            Ok(Some(_)) => match self.inner.take_pixels() {
                Some(PixelBuffer::Gray16(pixels)) => Ok(pixels),
                _ => FailedToDecodeSnafu { path }.fail(),
            },
            Ok(None) => FailedToDecodeSnafu { path }.fail(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "slice pixel decode failed");
                FailedToDecodeSnafu { path }.fail()
            }
        }
    }
}

struct Slice<D> {
    path: PathBuf,
    decoder: D,
    /// projection of the slice position onto the series normal
    location: Option<f64>,
    instance_number: Option<i32>,
}

/// Loads an ordered stack of slices from a directory into a [`Volume`].
///
/// The assembler is generic over its slice decoder so the ordering and
/// packing logic can be exercised without files; [`SeriesAssembler::new`]
/// gives the file-backed production configuration.
#[derive(Debug)]
pub struct SeriesAssembler<D = FileSliceDecoder> {
    cancel: CancelToken,
    _decoder: PhantomData<fn() -> D>,
}

impl SeriesAssembler<FileSliceDecoder> {
    pub fn new() -> Self {
        Self::with_decoder()
    }
}

impl Default for SeriesAssembler<FileSliceDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: SliceDecoder> SeriesAssembler<D> {
    /// An assembler using `D` as its slice decoder.
    pub fn with_decoder() -> Self {
        SeriesAssembler {
            cancel: CancelToken::new(),
            _decoder: PhantomData,
        }
    }

    /// A token that cancels loads running on this assembler.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Load every DICOM slice under `dir` into a volume.
    pub fn load(&self, dir: &Path, progress: &dyn ProgressSink) -> Result<Volume, Error> {
        let paths = enumerate_slices(dir);
        ensure!(
            !paths.is_empty(),
            EmptySeriesSnafu {
                dir: dir.to_path_buf(),
            }
        );
        debug!(count = paths.len(), dir = %dir.display(), "loading series");

        // pass 1: open every slice and validate it against the first
        let mut slices = Vec::with_capacity(paths.len());
        for path in paths {
            ensure!(!self.cancel.is_cancelled(), CancelledSnafu);
            let decoder = D::open(&path)?;
            let info = decoder.info();
            ensure!(
                info.samples_per_pixel == 1 && info.bit_depth == 16,
                UnsupportedPixelShapeSnafu {
                    samples: info.samples_per_pixel,
                    bit_depth: info.bit_depth,
                }
            );
            ensure!(
                info.number_of_frames <= 1,
                MultiFrameSnafu {
                    path: path.clone(),
                    frames: info.number_of_frames,
                }
            );
            let location = info.slice_location();
            let instance_number = info.instance_number;
            slices.push(Slice {
                path,
                decoder,
                location,
                instance_number,
            });
        }

        let reference = slices[0].decoder.info().clone();
        for slice in &slices[1..] {
            validate_against(&reference, slice.decoder.info())?;
        }

        // pass 2: order by the projection onto the slice normal, falling
        // back to instance numbers and then to file names
        slices.sort_by(compare_slices);

        // pass 3: reconcile the slice spacing
        let spacing_z = reconcile_z_spacing(&slices, reference.pixel_spacing.z);

        // pass 4: decode and pack
        let width = reference.width;
        let height = reference.height;
        let depth = slices.len() as u32;
        let samples_per_slice = width as usize * height as usize;
        let signed = reference.is_signed();
        let shape = VolumeShape {
            width,
            height,
            depth,
            spacing: Vector3::new(
                reference.pixel_spacing.x,
                reference.pixel_spacing.y,
                spacing_z,
            ),
        };

        let slice_count = slices.len();
        let mut voxels: Vec<i16> = Vec::with_capacity(samples_per_slice * slice_count);
        for (index, slice) in slices.iter_mut().enumerate() {
            ensure!(!self.cancel.is_cancelled(), CancelledSnafu);
            let pixels = slice.decoder.decode_slice()?;
            ensure!(
                pixels.len() == samples_per_slice,
                FailedToDecodeSnafu {
                    path: slice.path.clone(),
                }
            );
            if signed {
                // undo the unsigned normalization so the volume is
                // centred around zero
                voxels.extend(pixels.iter().map(|&v| (i32::from(v) - 32768) as i16));
            } else {
                voxels.extend(pixels.iter().map(|&v| v as i16));
            }
            progress.report(
                (index + 1) as f64 / slice_count as f64,
                index + 1,
                Some(pixels.len() * 2),
                &shape,
            );
        }

        let first_info = slices[0].decoder.info();
        let orientation = match first_info.orientation {
            Some((row, col)) => {
                let normal = row.cross(col).normalized();
                [
                    [row.x, row.y, row.z],
                    [col.x, col.y, col.z],
                    [normal.x, normal.y, normal.z],
                ]
            }
            None => [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
        };

        Ok(Volume {
            voxels,
            width,
            height,
            depth,
            spacing: shape.spacing,
            orientation,
            origin: first_info.position.unwrap_or(Vector3::ZERO),
            rescale_slope: first_info.rescale_slope,
            rescale_intercept: first_info.rescale_intercept,
            bits_allocated: 16,
            is_signed: signed,
            description: first_info.series_description.clone().unwrap_or_default(),
        })
    }
}

fn validate_against(reference: &ImageInfo, info: &ImageInfo) -> Result<(), Error> {
    ensure!(
        info.width == reference.width && info.height == reference.height,
        InconsistentSnafu {
            kind: InconsistencyKind::Dimensions,
        }
    );
    ensure!(
        info.pixel_representation == reference.pixel_representation,
        InconsistentSnafu {
            kind: InconsistencyKind::PixelRepresentation,
        }
    );
    let orientations_agree = match (reference.orientation, info.orientation) {
        (Some((r1, c1)), Some((r2, c2))) => {
            r1.approx_eq(r2, ORIENTATION_TOLERANCE) && c1.approx_eq(c2, ORIENTATION_TOLERANCE)
        }
        (None, None) => true,
        _ => false,
    };
    ensure!(
        orientations_agree,
        InconsistentSnafu {
            kind: InconsistencyKind::Orientation,
        }
    );
    Ok(())
}

fn compare_slices<D>(a: &Slice<D>, b: &Slice<D>) -> Ordering {
    if let (Some(x), Some(y)) = (a.location, b.location) {
        if (x - y).abs() > f64::EPSILON {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        }
    }
    if let (Some(x), Some(y)) = (a.instance_number, b.instance_number) {
        if x != y {
            return x.cmp(&y);
        }
    }
    a.path.file_name().cmp(&b.path.file_name())
}

/// Choose the slice spacing: the mean gap between consecutive projected
/// positions when available, unless it disagrees with the tagged value by
/// more than the tolerance.
fn reconcile_z_spacing<D>(slices: &[Slice<D>], tag_z: f64) -> f64 {
    let locations: Vec<f64> = slices.iter().filter_map(|s| s.location).collect();
    if locations.len() < 2 {
        return tag_z;
    }
    let gaps: f64 = locations.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    let computed = gaps / (locations.len() - 1) as f64;
    if computed <= 0.0 {
        return tag_z;
    }
    if (computed - tag_z).abs() > Z_SPACING_TOLERANCE_MM && tag_z > 0.0 {
        warn!(
            computed,
            tag = tag_z,
            "slice positions disagree with tagged spacing; keeping the tag"
        );
        tag_z
    } else {
        computed
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn has_dicom_name(path: &Path) -> bool {
    match path.extension() {
        None => true,
        Some(ext) => ext.eq_ignore_ascii_case("dcm"),
    }
}

/// Recursively collect regular files that look like DICOM slices,
/// in file name order.
fn enumerate_slices(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|path| has_dicom_name(path))
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    paths
}
