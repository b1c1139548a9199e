use criterion::{Criterion, criterion_group, criterion_main};
use dcmconv::dicom::{self, PixelPayload, TransferSyntax, UnknownSyntaxPolicy};
use dcmconv::image;
use dcmconv::{CommandDecoder, ConvertOptions, convert};
use std::hint::black_box;

const SIZE: u16 = 512;

fn element(out: &mut Vec<u8>, group: u16, elem: u16, vr: &[u8; 2], data: &[u8]) {
    out.extend_from_slice(&group.to_le_bytes());
    out.extend_from_slice(&elem.to_le_bytes());
    out.extend_from_slice(vr);
    if matches!(vr, b"OB" | b"OW") {
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    } else {
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    }
    out.extend_from_slice(data);
}

/// 512x512 16-bit MONOCHROME2 CT slice, explicit VR little endian
fn synthetic_ct() -> Vec<u8> {
    let mut meta = Vec::new();
    element(&mut meta, 0x0002, 0x0010, b"UI", b"1.2.840.10008.1.2.1\0");

    let mut out = vec![0u8; 128];
    out.extend_from_slice(b"DICM");
    element(&mut out, 0x0002, 0x0000, b"UL", &(meta.len() as u32).to_le_bytes());
    out.extend(meta);

    element(&mut out, 0x0008, 0x0016, b"UI", b"1.2.840.10008.5.1.4.1.1.2\0");
    element(&mut out, 0x0008, 0x0060, b"CS", b"CT");
    element(&mut out, 0x0010, 0x0010, b"PN", b"BENCH^PATIENT ");
    element(&mut out, 0x0028, 0x0002, b"US", &1u16.to_le_bytes());
    element(&mut out, 0x0028, 0x0004, b"CS", b"MONOCHROME2 ");
    element(&mut out, 0x0028, 0x0010, b"US", &SIZE.to_le_bytes());
    element(&mut out, 0x0028, 0x0011, b"US", &SIZE.to_le_bytes());
    element(&mut out, 0x0028, 0x0100, b"US", &16u16.to_le_bytes());
    element(&mut out, 0x0028, 0x0101, b"US", &12u16.to_le_bytes());
    element(&mut out, 0x0028, 0x0103, b"US", &0u16.to_le_bytes());
    element(&mut out, 0x0028, 0x1050, b"DS", b"40");
    element(&mut out, 0x0028, 0x1051, b"DS", b"400 ");
    element(&mut out, 0x0028, 0x1052, b"DS", b"-1024 ");
    element(&mut out, 0x0028, 0x1053, b"DS", b"1 ");

    let pixels: Vec<u8> = (0..u32::from(SIZE) * u32::from(SIZE))
        .flat_map(|i| (((i * 7) % 4096) as u16).to_le_bytes())
        .collect();
    element(&mut out, 0x7FE0, 0x0010, b"OW", &pixels);
    out
}

// ============================================================================
// FULL PIPELINE
// ============================================================================

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");
    let bytes = synthetic_ct();
    let decoder = CommandDecoder::new();
    let options = ConvertOptions::default();

    group.bench_function("ct_512x512", |b| {
        b.iter(|| {
            let result = convert(black_box(bytes.clone()), &decoder, &options).unwrap();
            black_box(result);
        });
    });

    group.finish();
}

// ============================================================================
// COMPONENTS
// ============================================================================

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("dicom_parsing");
    let bytes = synthetic_ct();

    group.bench_function("parse_ct_512x512", |b| {
        b.iter(|| dicom::parse(black_box(bytes.clone())).unwrap());
    });

    group.bench_function("metadata_ct_512x512", |b| {
        let dataset = dicom::parse(bytes.clone()).unwrap();
        let skip = dicom::default_skip_tags();
        b.iter(|| dicom::extract_metadata(black_box(&dataset), &skip));
    });

    group.finish();
}

fn bench_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruction");
    let dataset = dicom::parse(synthetic_ct()).unwrap();
    let syntax = dicom::resolve_transfer_syntax(&dataset, UnknownSyntaxPolicy::Fail).unwrap();
    let samples = match dicom::extract_pixel_data(&dataset, syntax).unwrap() {
        PixelPayload::Native(samples) => samples,
        PixelPayload::Compressed(_) => unreachable!("native dataset"),
    };
    assert_eq!(syntax, TransferSyntax::ExplicitVrLittleEndian);

    group.bench_function("reconstruct_ct_512x512", |b| {
        b.iter(|| {
            let raster = image::reconstruct(black_box(&samples), &dataset, None).unwrap();
            black_box(raster);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_full_pipeline, bench_parsing, bench_reconstruction);
criterion_main!(benches);
