//! Native GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Understands the tags DEM tiles actually carry: ModelPixelScale +
//! ModelTiepoint for georeferencing, the GeoKey directory for the EPSG code
//! and GDAL_NODATA for the no-data sentinel.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

// The decoder files known tag numbers under their named variants, so
// lookups through `Tag::Unknown(n)` never match.
const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Read a single-band GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn tiff_err(context: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{}: {}", context, e))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;

    let data: Vec<T> = match decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?
    {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Multi-sample images decode to more values than cells
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder)? {
        raster.set_transform(transform);
    }
    raster.set_crs(read_epsg(&mut decoder)?.map(CRS::from_epsg));
    raster.set_nodata(read_nodata(&mut decoder)?);

    Ok(raster)
}

/// Origin and cell size from ModelPixelScale + ModelTiepoint.
///
/// `None` when the file carries neither tag; an error when only one is
/// present or either is malformed.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<GeoTransform>> {
    let scale = decoder
        .find_tag(MODEL_PIXEL_SCALE)
        .map_err(tiff_err("Cannot read ModelPixelScale"))?;
    let tiepoint = decoder
        .find_tag(MODEL_TIEPOINT)
        .map_err(tiff_err("Cannot read ModelTiepoint"))?;

    let (scale, tiepoint) = match (scale, tiepoint) {
        (None, None) => return Ok(None),
        (Some(scale), Some(tiepoint)) => (
            scale.into_f64_vec().map_err(tiff_err("Invalid ModelPixelScale"))?,
            tiepoint.into_f64_vec().map_err(tiff_err("Invalid ModelTiepoint"))?,
        ),
        _ => {
            return Err(Error::InvalidRaster(
                "GeoTIFF has only one of ModelPixelScale and ModelTiepoint".into(),
            ))
        }
    };

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(Error::InvalidRaster(format!(
            "malformed georeferencing: {} scale and {} tiepoint values",
            scale.len(),
            tiepoint.len()
        )));
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1])))
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<u32>> {
    let keys = match decoder
        .find_tag(GEO_KEY_DIRECTORY)
        .map_err(tiff_err("Cannot read GeoKeyDirectory"))?
    {
        Some(value) => value.into_u16_vec().map_err(tiff_err("Invalid GeoKeyDirectory"))?,
        None => return Ok(None),
    };
    Ok(parse_geokey_epsg(&keys))
}

/// EPSG code from a GeoKey directory; the projected key wins over the
/// geographic one.
fn parse_geokey_epsg(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    let entries = keys.get(4..4 + count * 4)?;

    let mut projected = None;
    let mut geographic = None;
    for entry in entries.chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE => projected = Some(value as u32),
            GEOGRAPHIC_TYPE => geographic = Some(value as u32),
            _ => {}
        }
    }
    projected.or(geographic)
}

fn read_nodata<T: RasterElement, R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<T>> {
    let text = match decoder
        .find_tag(GDAL_NODATA)
        .map_err(tiff_err("Cannot read GDAL_NODATA"))?
    {
        Some(value) => value.into_string().map_err(tiff_err("Invalid GDAL_NODATA"))?,
        None => return Ok(None),
    };
    let text = text.trim_matches(char::from(0)).trim();
    let value: f64 = text
        .parse()
        .map_err(|_| Error::InvalidRaster(format!("GDAL_NODATA is not a number: {:?}", text)))?;
    Ok(num_traits::cast(value).or_else(|| value.is_nan().then(T::default_nodata)))
}

/// Write a Raster to a GeoTIFF file (32-bit float samples)
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(tiff_err("Cannot create TIFF image"))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(MODEL_PIXEL_SCALE, &scale[..])
        .map_err(tiff_err("Cannot write scale tag"))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(MODEL_TIEPOINT, &tiepoint[..])
        .map_err(tiff_err("Cannot write tiepoint tag"))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(GEO_KEY_DIRECTORY, &geokeys[..])
        .map_err(tiff_err("Cannot write geokey tag"))?;

    // Cells written as NaN are no-data in the output file
    if raster.nodata().is_some() {
        image
            .encoder()
            .write_tag(GDAL_NODATA, "nan")
            .map_err(tiff_err("Cannot write nodata tag"))?;
    }

    image
        .write_data(&data)
        .map_err(tiff_err("Cannot write image data"))?;

    Ok(())
}

fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(CRS::epsg).and_then(|code| u16::try_from(code).ok());
    let geographic = crs.is_some_and(CRS::is_geographic);

    let mut keys: Vec<[u16; 4]> = vec![
        // ModelTypeProjected = 1, ModelTypeGeographic = 2
        [GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 }],
        // RasterPixelIsArea
        [GT_RASTER_TYPE, 0, 1, 1],
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        keys.push([key, 0, 1, code]);
    }

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.into_iter().flatten());
    directory
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dem() -> Raster<f64> {
        let mut raster = Raster::from_vec(
            vec![2600.0, 2580.5, 2571.0, -9999.0, 2550.25, 2549.0],
            2,
            3,
        )
        .unwrap();
        raster.set_transform(GeoTransform::new(580_000.0, 520_000.0, 30.0, -30.0));
        raster.set_crs(Some(CRS::utm(18, true)));
        raster.set_nodata(Some(-9999.0));
        raster
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeferencing() {
        let buf = write_geotiff_to_buffer(&sample_dem()).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.transform(), &GeoTransform::new(580_000.0, 520_000.0, 30.0, -30.0));
        assert_eq!(back.crs().and_then(CRS::epsg), Some(32618));
        assert_eq!(back.get(0, 1).unwrap(), 2580.5);
        // sentinel was written as NaN with a NaN nodata tag
        assert!(back.get(1, 0).unwrap().is_nan());
        assert!(back.nodata().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_file_roundtrip_geographic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");

        let mut dem = sample_dem();
        dem.set_transform(GeoTransform::new(-74.2, 4.7, 1.0 / 1200.0, -1.0 / 1200.0));
        dem.set_crs(Some(CRS::wgs84()));
        write_geotiff(&dem, &path).unwrap();

        let back: Raster<f64> = read_geotiff(&path).unwrap();
        assert_eq!(back.crs().and_then(CRS::epsg), Some(4326));
        assert!((back.transform().origin_x + 74.2).abs() < 1e-9);
    }

    /// Single-pixel float TIFF with only the given tags attached
    fn tiff_with_tags(tags: &[(Tag, &[f64])], nodata: Option<&str>) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
        let mut image = encoder.new_image::<Gray32Float>(1, 1).unwrap();
        for (tag, values) in tags {
            image.encoder().write_tag(*tag, *values).unwrap();
        }
        if let Some(text) = nodata {
            image.encoder().write_tag(GDAL_NODATA, text).unwrap();
        }
        image.write_data(&[1.0f32]).unwrap();
        buf
    }

    #[test]
    fn test_roundtrip_keeps_cell_size_and_nodata() {
        let mut dem = sample_dem();
        dem.set_transform(GeoTransform::new(500_000.0, 4_000_500.0, 10.0, -10.0));
        let buf = write_geotiff_to_buffer(&dem).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.transform().cell_dimensions(), (10.0, 10.0));
        assert_eq!(back.transform().origin_y, 4_000_500.0);
        assert!(back.nodata().is_some());
    }

    #[test]
    fn test_scale_without_tiepoint_is_rejected() {
        let buf = tiff_with_tags(&[(MODEL_PIXEL_SCALE, &[30.0, 30.0, 0.0])], None);
        let err = read_geotiff_from_buffer::<f64>(&buf).unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)));
    }

    #[test]
    fn test_short_tiepoint_is_rejected() {
        let buf = tiff_with_tags(
            &[(MODEL_PIXEL_SCALE, &[30.0, 30.0, 0.0]), (MODEL_TIEPOINT, &[0.0, 0.0, 0.0])],
            None,
        );
        assert!(read_geotiff_from_buffer::<f64>(&buf).is_err());
    }

    #[test]
    fn test_plain_tiff_has_no_georeferencing() {
        let buf = tiff_with_tags(&[], None);
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();
        assert!(back.crs().is_none());
        assert!(back.nodata().is_none());
        assert_eq!(back.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_numeric_nodata_tag_is_applied() {
        let buf = tiff_with_tags(&[], Some("-9999"));
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();
        assert_eq!(back.nodata(), Some(-9999.0));

        let garbled = tiff_with_tags(&[], Some("none"));
        assert!(read_geotiff_from_buffer::<f64>(&garbled).is_err());
    }

    #[test]
    fn test_u8_roundtrip() {
        let mut codes: Raster<u8> = Raster::from_vec(vec![1, 7, 8, 0], 2, 2).unwrap();
        codes.set_nodata(Some(0));
        let buf = write_geotiff_to_buffer(&codes).unwrap();
        let back: Raster<u8> = read_geotiff_from_buffer(&buf).unwrap();
        assert_eq!(back.data().iter().copied().collect::<Vec<_>>(), vec![1, 7, 8, 0]);
    }

    #[test]
    fn test_parse_geokeys_prefers_projected() {
        let keys = [1, 1, 0, 3, 1024, 0, 1, 1, 2048, 0, 1, 4326, 3072, 0, 1, 32618];
        assert_eq!(parse_geokey_epsg(&keys), Some(32618));
        let user_defined = [1, 1, 0, 1, 3072, 0, 1, 32767];
        assert_eq!(parse_geokey_epsg(&user_defined), None);
        assert_eq!(parse_geokey_epsg(&[1, 1]), None);
    }
}
