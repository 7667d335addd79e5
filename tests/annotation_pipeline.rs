use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use famannot::{
    BarcodeJob, GmcJob, annotate_barcodes, annotate_gene_counts,
    config::{PedigreeSource, RunConfig},
    gmc::{GmcConfig, RawCount},
    smart_reader::VariantReader,
};
use noodles::vcf::{
    self,
    variant::{
        RecordBuf,
        record_buf::samples::sample::{Value, value::Array},
    },
};
use tempfile::tempdir;

const HEADER: &str = "##fileformat=VCFv4.3
##contig=<ID=1,length=1000000>
##contig=<ID=2,length=1000000>
##INFO=<ID=gene,Number=1,Type=String,Description=\"Gene symbol\">
##INFO=<ID=OMIM_ID,Number=1,Type=String,Description=\"OMIM gene id\">
##INFO=<ID=gnomAD_AF,Number=1,Type=Float,Description=\"gnomAD allele frequency\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
";

const TRIO_PED: &str = "# family\tindividual\tfather\tmother\tsex\tphenotype
FAM1\tA\tF\tM\t1\t2
FAM1\tM\t0\t0\t2\t1
FAM1\tF\t0\t0\t1\t1
";

fn write_vcf(dir: &Path, name: &str, samples: &[&str], rows: &[&str]) -> PathBuf {
    let mut text = String::from(HEADER);
    text.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT");
    for sample in samples {
        text.push('\t');
        text.push_str(sample);
    }
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn read_records(path: &Path) -> (vcf::Header, Vec<RecordBuf>) {
    let mut reader = VariantReader::open(path).unwrap();
    let header = reader.header().clone();
    let records = reader.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
    (header, records)
}

fn sample_values(record: &RecordBuf, key: &str) -> Vec<Option<Value>> {
    record
        .samples()
        .values()
        .map(|sample| sample.get(key).flatten().cloned())
        .collect()
}

fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

fn names(values: &[&str]) -> Option<Value> {
    Some(Value::Array(Array::String(
        values.iter().map(|v| Some(v.to_string())).collect(),
    )))
}

fn data_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn barcode_job(dir: &Path, input: PathBuf, output: &str, pedigree: PedigreeSource) -> BarcodeJob {
    BarcodeJob {
        input,
        output: dir.join(output),
        pedigree,
        config: RunConfig::default(),
    }
}

#[test]
fn trio_barcodes_and_unrelated_sample() {
    let dir = tempdir().unwrap();
    let ped = dir.path().join("trio.ped");
    fs::write(&ped, TRIO_PED).unwrap();
    let input = write_vcf(
        dir.path(),
        "in.vcf",
        &["M", "A", "U", "F"],
        &[
            "1\t100\t.\tA\tG\t.\tPASS\t.\tGT\t0/0\t0/1\t1/1\t0/0",
            "1\t200\t.\tC\tT\t.\tPASS\t.\tGT\t1/1\t./.\t0/1\t0|1",
        ],
    );

    let job = barcode_job(dir.path(), input, "out.vcf", PedigreeSource::Path(ped.clone()));
    let summary = annotate_barcodes(&job).unwrap();
    assert_eq!(summary.total_records, 2);
    assert_eq!(summary.records_annotated, 2);
    assert_eq!(summary.samples_with_family, 3);
    assert_eq!(summary.samples_without_family, 1);
    assert_eq!(summary.pedigree, Some(ped));

    let (header, records) = read_records(&job.output);
    assert!(header.formats().contains_key("BCF"));
    assert!(header.formats().contains_key("BCFS"));

    // the "." sentinel is VCF-missing, so it reads back as no value
    let first = &records[0];
    assert_eq!(
        sample_values(first, "BCF"),
        vec![text("100"), text("100"), None, text("100")]
    );
    let trio = names(&["A", "M", "F"]);
    assert_eq!(
        sample_values(first, "BCFS"),
        vec![trio.clone(), trio.clone(), None, trio]
    );

    // missing GT on the child reads as hom-ref
    assert_eq!(
        sample_values(&records[1], "BCF"),
        vec![text("021"), text("021"), None, text("021")]
    );

    let lines = data_lines(&job.output);
    let text = fs::read_to_string(&job.output).unwrap();
    assert!(text.contains("##FORMAT=<ID=BCFS,Number=.,Type=String"));
    assert!(lines[0].ends_with("\t0/0:100:A,M,F\t0/1:100:A,M,F\t1/1:.:.\t0/0:100:A,M,F"));
    assert!(!lines[0].contains("%2C"));
}

#[test]
fn missing_application_pedigree_leaves_everyone_unrelated() {
    let dir = tempdir().unwrap();
    let input = write_vcf(
        dir.path(),
        "in.vcf",
        &["A", "M"],
        &["1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1\t0/0"],
    );
    let mut job = barcode_job(
        dir.path(),
        input,
        "out.vcf",
        PedigreeSource::Application(String::from("EXOME")),
    );
    job.config = RunConfig {
        ped_dir: Some(dir.path().join("peds")),
        app_to_ped: BTreeMap::from([(String::from("EXOME"), String::from("exome.ped"))]),
        ..RunConfig::default()
    };

    let summary = annotate_barcodes(&job).unwrap();
    assert_eq!(summary.samples_with_family, 0);
    assert_eq!(summary.pedigree, None);

    let (_, records) = read_records(&job.output);
    assert_eq!(sample_values(&records[0], "BCF"), vec![None, None]);
    assert!(data_lines(&job.output)[0].ends_with("\t0/1:.:.\t0/0:.:."));
}

#[test]
fn json_pedigree_and_bcf_output() {
    let dir = tempdir().unwrap();
    let ped = dir.path().join("trio.json");
    fs::write(
        &ped,
        r#"[
            {"id": "A", "famID": "FAM1", "paternalID": "F", "maternalID": "M", "sex": 1, "phenotype": 2, "HPOList": ["HP:0001250"]},
            {"id": "M", "famID": "FAM1", "paternalID": "", "maternalID": "", "sex": 2, "phenotype": 1},
            {"id": "F", "famID": "FAM1", "paternalID": null, "maternalID": null, "sex": 1, "phenotype": 1}
        ]"#,
    )
    .unwrap();
    let input = write_vcf(
        dir.path(),
        "in.vcf",
        &["A", "M", "F"],
        &["2\t500\t.\tG\tA\t.\t.\t.\tGT\t0/1\t0/1\t0/0"],
    );

    let job = barcode_job(dir.path(), input, "out.bcf", PedigreeSource::Path(ped));
    annotate_barcodes(&job).unwrap();

    let (_, records) = read_records(&job.output);
    assert_eq!(records.len(), 1);
    assert_eq!(
        sample_values(&records[0], "BCF"),
        vec![text("110"), text("110"), text("110")]
    );
}

#[test]
fn gene_counts_with_dosage_share_one_vector() {
    let dir = tempdir().unwrap();
    let input = write_vcf(
        dir.path(),
        "in.vcf",
        &["S1", "S2"],
        &[
            "1\t100\t.\tA\tG\t.\t.\tgene=BRCA1\tGT\t0/1\t0/0",
            "1\t200\t.\tC\tT\t.\t.\tgene=BRCA1\tGT\t1/1\t0/1",
        ],
    );
    let job = GmcJob {
        input,
        output: dir.path().join("out.vcf.gz"),
        config: GmcConfig {
            raw_count: RawCount::Dosage,
            do_filtered_gmc: false,
            ..GmcConfig::default()
        },
    };
    let summary = annotate_gene_counts(&job).unwrap();
    assert_eq!(summary.distinct_genes, 1);

    let (header, records) = read_records(&job.output);
    assert!(header.formats().contains_key("GMC"));
    assert!(!header.formats().contains_key("GMC_FILTERED"));
    for record in &records {
        assert_eq!(
            sample_values(record, "GMC"),
            vec![Some(Value::Integer(3)), Some(Value::Integer(1))]
        );
    }
}

#[test]
fn filtered_counts_follow_the_cascade_and_floor() {
    let dir = tempdir().unwrap();
    let input = write_vcf(
        dir.path(),
        "in.vcf",
        &["S1", "S2", "S3"],
        &[
            "1\t100\t.\tA\tG\t.\t.\tgene=BRCA1;OMIM_ID=113705\tGT\t0/1\t0/1\t0/0",
            "1\t200\t.\tC\tT\t.\t.\tgene=BRCA1;OMIM_ID=113705;gnomAD_AF=0.2\tGT\t1/1\t0/0\t./.",
            "1\t300\t.\tG\tA\t.\t.\t.\tGT\t0/1\t0/1\t0/1",
            "2\t400\t.\tT\tC\t.\t.\tgene=CFTR;OMIM_ID=602421\tGT\t0/1\t0/0\t0/1",
        ],
    );
    let job = GmcJob {
        input,
        output: dir.path().join("out.vcf"),
        config: GmcConfig::default(),
    };
    let summary = annotate_gene_counts(&job).unwrap();
    assert_eq!(summary.total_records, 4);
    assert_eq!(summary.records_annotated, 3);
    assert_eq!(summary.records_without_gene, 1);
    assert_eq!(summary.distinct_genes, 2);
    assert_eq!(summary.records_passing_filter, 2);

    let (_, records) = read_records(&job.output);
    let int = |n| Some(Value::Integer(n));

    for record in &records[..2] {
        assert_eq!(sample_values(record, "GMC"), vec![int(2), int(1), int(0)]);
        assert_eq!(
            sample_values(record, "GMC_FILTERED"),
            vec![int(1), int(0), int(0)]
        );
    }
    assert_eq!(sample_values(&records[2], "GMC"), vec![None, None, None]);
    assert_eq!(sample_values(&records[3], "GMC"), vec![int(1), int(0), int(1)]);
    assert_eq!(
        sample_values(&records[3], "GMC_FILTERED"),
        vec![int(0), int(0), int(0)]
    );
}

#[test]
fn repeated_records_are_matched_in_order() {
    let dir = tempdir().unwrap();
    let input = write_vcf(
        dir.path(),
        "in.vcf",
        &["S1", "S2"],
        &[
            "1\t100\t.\tA\tG\t.\t.\tgene=G1\tGT\t0/1\t0/0",
            "1\t100\t.\tA\tG\t.\t.\tgene=G2\tGT\t0/0\t0/1",
            "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1\t0/1",
        ],
    );
    let job = GmcJob {
        input,
        output: dir.path().join("out.vcf"),
        config: GmcConfig {
            do_filtered_gmc: false,
            ..GmcConfig::default()
        },
    };
    let summary = annotate_gene_counts(&job).unwrap();
    assert_eq!(summary.records_annotated, 2);
    assert_eq!(summary.records_without_gene, 1);

    let lines = data_lines(&job.output);
    assert!(lines[0].ends_with("\tGT:GMC\t0/1:1\t0/0:0"));
    assert!(lines[1].ends_with("\tGT:GMC\t0/0:0\t0/1:1"));
    assert!(lines[2].ends_with("\tGT\t0/1\t0/1"));
}

#[test]
fn multi_gene_value_aborts_without_output() {
    let dir = tempdir().unwrap();
    let input = write_vcf(
        dir.path(),
        "in.vcf",
        &["S1"],
        &["1\t100\t.\tA\tG\t.\t.\tgene=GENE1/GENE2\tGT\t0/1"],
    );
    let job = GmcJob {
        input,
        output: dir.path().join("out.vcf"),
        config: GmcConfig::default(),
    };
    let err = annotate_gene_counts(&job).unwrap_err();
    assert!(format!("{err:#}").contains("GENE1/GENE2"));
    assert!(!job.output.exists());
}

#[test]
fn malformed_pedigree_row_is_reported() {
    let dir = tempdir().unwrap();
    let ped = dir.path().join("bad.ped");
    fs::write(&ped, "FAM1\tA\t0\t0\t1\t2\textra\n").unwrap();
    let input = write_vcf(
        dir.path(),
        "in.vcf",
        &["A"],
        &["1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1"],
    );
    let job = barcode_job(dir.path(), input, "out.vcf", PedigreeSource::Path(ped));
    let err = annotate_barcodes(&job).unwrap_err();
    assert!(format!("{err:#}").contains("found 7"));
    assert!(!job.output.exists());
}
