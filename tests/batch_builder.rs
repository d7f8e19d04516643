#[path = "common/mod.rs"]
mod common;

use std::fs;
use std::path::Path;

use common::{assert_snapshot, fingerprint_tree, write_file};
use gencompass::config::{PipelineConfig, StageKind};
use gencompass::intervals::IntervalBinner;
use gencompass::manifest::{FastqTable, Manifest};
use gencompass::workflow::stages::{
    HarmonizeStage, JointGenotypeStage, MappingStage, PremapQcStage, VariantCallingStage,
};
use gencompass::workflow::{
    BatchBuilder, BatchSettings, Environment, InputTemplate, KnownArtifacts, Mode, WorkflowError,
};
use serde_json::{json, Value};

fn template(value: Value) -> InputTemplate {
    InputTemplate::from_value("template.json", value).expect("template is an object")
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read json")).expect("parse json")
}

fn settings(dir: &Path) -> BatchSettings {
    BatchSettings::new("proj", "run1").with_output_dir(dir)
}

#[test]
fn one_input_and_options_file_per_sample() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path()).with_environment(Environment::Slurm);
    let samples = ["S1", "S2", "S3"];
    let summary = BatchBuilder::new(&settings)
        .build(&PremapQcStage::new(samples), &template(json!({})))
        .unwrap();

    assert_eq!(summary.input_files.len(), 3);
    assert_eq!(summary.options_files.len(), 3);
    assert_eq!(summary.run_scripts.len(), 3);
    for sample in samples {
        let inputs = read_json(
            &dir.path()
                .join("premap_qc_inputs")
                .join(format!("{sample}.premap_qc_inputs.json")),
        );
        assert_eq!(inputs["PremapQC.sampleID"], json!(sample));
    }

    let script = fs::read_to_string(dir.path().join("S2.premap_qc_run.sh")).unwrap();
    assert!(script.contains("--inputs"));
    assert!(script.contains("premap_qc_inputs/S2.premap_qc_inputs.json"));
}

#[test]
fn rebuilding_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path()).with_environment(Environment::Swarm);
    let stage = VariantCallingStage::new(["S1", "S2"]);
    let template = template(json!({"VariantCalling.reference": "hg38.fa"}));
    let builder = BatchBuilder::new(&settings);

    builder.build(&stage, &template).unwrap();
    let first = fingerprint_tree(dir.path());
    builder.build(&stage, &template).unwrap();
    assert_eq!(first, fingerprint_tree(dir.path()), "outputs diverged across runs");
}

#[test]
fn variant_calling_inputs_match_golden() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let summary = BatchBuilder::new(&settings)
        .build(
            &VariantCallingStage::new(["S1"]),
            &template(json!({"VariantCalling.reference": "hg38.fa"})),
        )
        .unwrap();

    let inputs = fs::read_to_string(&summary.input_files[0]).unwrap();
    assert_snapshot("variant_calling/S1.inputs.json", &inputs);
    let options = fs::read_to_string(&summary.options_files[0]).unwrap();
    assert_snapshot("variant_calling/S1.options.json", &options);
}

#[test]
fn premap_resume_flags_follow_existing_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let known: KnownArtifacts = ["results/premap_qc/fastp/S1", "results/premap_qc/fastqc/S2"]
        .into_iter()
        .collect();
    let settings = settings(dir.path())
        .with_environment(Environment::Local)
        .with_checker(known);
    let template = template(json!({
        "PremapQC.runFastp": true,
        "PremapQC.runFastQC": true,
        "PremapQC.runFastqScreen": true
    }));
    let summary = BatchBuilder::new(&settings)
        .build(&PremapQcStage::new(["S1", "S2"]), &template)
        .unwrap();

    let s1 = read_json(&summary.input_files[0]);
    assert_eq!(s1["PremapQC.runFastp"], json!(false));
    assert_eq!(s1["PremapQC.runFastQC"], json!(true));
    let s2 = read_json(&summary.input_files[1]);
    assert_eq!(s2["PremapQC.runFastp"], json!(true));
    assert_eq!(s2["PremapQC.runFastQC"], json!(false));
    assert_eq!(s2["PremapQC.runFastqScreen"], json!(true));
}

fn mapping_inputs() -> (Manifest, FastqTable) {
    let manifest = Manifest::from_table(
        Path::new("manifest.tsv"),
        vec!["Sample ID".into(), "Sample Run ID".into()],
        vec![
            vec!["S1".into(), "SR1".into()],
            vec!["S2".into(), "SR2".into()],
        ],
    )
    .unwrap();
    let fastq = FastqTable::from_locations(
        [
            "/raw/SR1_S1_L001_R1_001.fastq.gz",
            "/raw/SR1_S1_L001_R2_001.fastq.gz",
            "/raw/SR2_S2_L002_R1_001.fastq.gz",
        ],
        &manifest,
    );
    (manifest, fastq)
}

#[test]
fn mapping_resumes_from_existing_bam() {
    let dir = tempfile::tempdir().unwrap();
    let (_manifest, fastq) = mapping_inputs();
    let known: KnownArtifacts = [
        "results/fq2bam/S1/S1.bam",
        "results/mapping_qc/kraken2/S1",
        "results/mapping_qc/somalier/extract/S2.somalier",
    ]
    .into_iter()
    .collect();
    let settings = settings(dir.path())
        .with_environment(Environment::Slurm)
        .with_checker(known);
    let summary = BatchBuilder::new(&settings)
        .build(
            &MappingStage::new(["S1", "S2"], &fastq),
            &template(json!({"Mapping.mappedBAM": "placeholder.bam"})),
        )
        .unwrap();

    let s1 = read_json(&summary.input_files[0]);
    assert_eq!(s1["Mapping.mappedBAM"], json!("results/fq2bam/S1/S1.bam"));
    assert!(s1.get("Mapping.sampleFastqFiles").is_none());
    assert_eq!(s1["Mapping.runKraken"], json!(false));

    let s2 = read_json(&summary.input_files[1]);
    assert!(s2.get("Mapping.mappedBAM").is_none());
    assert_eq!(
        s2["Mapping.sampleFastqFiles"],
        json!(["results/premap_qc/fastp/S2/SR2_S2_L002_R1_fastp.fastq.gz"])
    );
    assert_eq!(s2["Mapping.runSomalier"], json!(false));
    assert!(s2.get("Mapping.runKraken").is_none());
}

#[test]
fn aws_uses_bare_keys_and_never_probes() {
    let dir = tempfile::tempdir().unwrap();
    let (_manifest, fastq) = mapping_inputs();
    let known: KnownArtifacts = ["results/fq2bam/S1/S1.bam"].into_iter().collect();
    let settings = settings(dir.path())
        .with_environment(Environment::Aws)
        .with_checker(known);
    let summary = BatchBuilder::new(&settings)
        .build(&MappingStage::new(["S1"], &fastq), &template(json!({})))
        .unwrap();

    let s1 = read_json(&summary.input_files[0]);
    assert_eq!(s1["sampleID"], json!("S1"));
    assert_eq!(
        s1["sampleFastqFiles"],
        json!([
            "results/premap_qc/fastp/S1/SR1_S1_L001_R1_fastp.fastq.gz",
            "results/premap_qc/fastp/S1/SR1_S1_L001_R2_fastp.fastq.gz"
        ])
    );
    assert!(s1.get("mappedBAM").is_none());
    assert_eq!(
        summary.batch_script.as_deref(),
        Some(dir.path().join("proj_run1_mapping.sh").as_path())
    );
}

#[test]
fn mapping_sample_without_fastq_is_inconsistent() {
    let dir = tempfile::tempdir().unwrap();
    let (_manifest, fastq) = mapping_inputs();
    let settings = settings(dir.path());
    let err = BatchBuilder::new(&settings)
        .build(&MappingStage::new(["S9"], &fastq), &template(json!({})))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InconsistentState(_)));
}

#[test]
fn joint_genotype_run_mode_writes_gvcf_lists() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let stage = JointGenotypeStage::new(["S1", "S2"], "/configs/strelka.yml");
    let summary = BatchBuilder::new(&settings)
        .build(&stage, &template(json!({"JointGenotype.calledVariants": []})))
        .unwrap();

    assert_eq!(summary.units, vec!["deepvariant", "haplotypecaller", "strelka2"]);
    let fof = dir
        .path()
        .join("joint_genotype_inputs")
        .join("proj.run1.strelka2_vcf_files.txt");
    assert_eq!(
        fs::read_to_string(&fof).unwrap(),
        "results/strelka2/S1/S1.strelka.genome.vcf.gz\nresults/strelka2/S2/S2.strelka.genome.vcf.gz\n"
    );

    let strelka = read_json(&summary.input_files[2]);
    assert_eq!(strelka["JointGenotype.caller"], json!("strelka2"));
    assert_eq!(strelka["JointGenotype.glnexusConfig"], json!("/configs/strelka.yml"));
    assert_eq!(strelka["JointGenotype.variantFOF"], json!(fof.display().to_string()));
    assert!(strelka.get("JointGenotype.calledVariants").is_none());

    let gatk = read_json(&summary.input_files[1]);
    assert_eq!(gatk["JointGenotype.glnexusConfig"], json!("gatk"));
}

#[test]
fn joint_genotype_without_strelka_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let err = BatchBuilder::new(&settings)
        .build(&JointGenotypeStage::new(["S1"], " "), &template(json!({})))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Config(_)));
    assert!(!dir
        .path()
        .join("joint_genotype_inputs")
        .join("strelka2.joint_genotype_inputs.json")
        .exists());
}

#[test]
fn prepare_defaults_strelka_config_to_template_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("manifest.tsv"), "Sample ID\tSample Run ID\nS1\tSR1\n");
    write_file(&root.join("fastq.txt"), "/raw/SR1_S1_L001_R1_001.fastq.gz\n");
    let templates = root.join("templates");
    write_file(
        &templates.join("input_templates/joint_genotype.inputs_template.json"),
        "{}",
    );

    let config = PipelineConfig::new("proj", root.join("fastq.txt"), root.join("manifest.tsv"))
        .with_run_id("run1")
        .with_stages(vec![StageKind::JointGenotype])
        .with_template_dir(&templates)
        .with_output_dir(root.join("out"));
    let summaries = gencompass::pipeline::prepare(&config).unwrap();

    let strelka = read_json(&summaries[0].input_files[2]);
    assert_eq!(
        strelka["JointGenotype.glnexusConfig"],
        json!(templates.join("config/strelka2_glnexus.yml").display().to_string())
    );
}

#[test]
fn joint_genotype_server_mode_inlines_gvcfs() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path()).with_mode(Mode::Server);
    let stage = JointGenotypeStage::new(["S1"], "strelka.yml");
    let summary = BatchBuilder::new(&settings)
        .build(&stage, &template(json!({"JointGenotype.variantFOF": "old.txt"})))
        .unwrap();

    let deepvariant = read_json(&summary.input_files[0]);
    assert_eq!(
        deepvariant["JointGenotype.calledVariants"],
        json!(["results/deepvariant/S1/S1.deepvariant.g.vcf.gz"])
    );
    assert!(deepvariant.get("JointGenotype.variantFOF").is_none());
    assert!(!dir
        .path()
        .join("joint_genotype_inputs")
        .join("proj.run1.deepvariant_vcf_files.txt")
        .exists());
}

#[test]
fn joint_genotype_aws_omics_uses_bare_variant_keys() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path()).with_mode(Mode::AwsOmics);
    let summary = BatchBuilder::new(&settings)
        .build(&JointGenotypeStage::new(["S1"], "strelka.yml"), &template(json!({})))
        .unwrap();

    let haplotypecaller = read_json(&summary.input_files[1]);
    assert_eq!(
        haplotypecaller["calledVariants"],
        json!(["results/haplotypecaller/S1/S1.haplotypecaller.g.vcf.gz"])
    );
    assert_eq!(haplotypecaller["JointGenotype.caller"], json!("haplotypecaller"));
}

#[test]
fn joint_genotype_runtime_scales_with_samples() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path())
        .with_environment(Environment::Swarm)
        .with_runtime_parameters(vec![
            "#SWARM --threads-per-process 8".into(),
            "#SWARM --time 4:00:00".into(),
        ]);
    let samples: Vec<String> = (0..100).map(|i| format!("S{i:03}")).collect();
    let stage = JointGenotypeStage::new(&samples, "strelka.yml");
    let summary = BatchBuilder::new(&settings)
        .build(
            &stage,
            &template(json!({"JointGenotype.glnexusRuntimeAttributes": {"cpu": 8}})),
        )
        .unwrap();

    let script = fs::read_to_string(summary.batch_script.unwrap()).unwrap();
    let lines: Vec<&str> = script.lines().collect();
    assert_eq!(lines[1], "#SWARM --time 6:00:00");
    assert_eq!(lines.len(), 2 + 3);

    let inputs = read_json(&summary.input_files[0]);
    assert_eq!(
        inputs["JointGenotype.glnexusRuntimeAttributes"],
        json!({"cpu": 8, "runtimeMinutes": 360})
    );
}

#[test]
fn harmonize_per_bin() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let stage = HarmonizeStage::from_labels(["chr1.0", "chr1.1"]);
    let summary = BatchBuilder::new(&settings)
        .build(&stage, &template(json!({"Harmonize.project": "cohort"})))
        .unwrap();

    assert_eq!(summary.units, vec!["proj_run1_chr1.0", "proj_run1_chr1.1"]);
    let inputs = read_json(
        &dir.path()
            .join("harmonize_inputs")
            .join("proj_run1_chr1.1.harmonize_inputs.json"),
    );
    assert_eq!(inputs["Harmonize.project"], json!("cohort_chr1.1"));
    assert_eq!(
        inputs["Harmonize.strelka2VCFIndex"],
        json!("results/joint_genotype/strelka2/strelka2.chr1.1.bcf.gz.tbi")
    );
    let options = read_json(&summary.options_files[1]);
    assert_eq!(options["final_workflow_log_dir"], json!("logging/harmonize/chr1.1"));
}

#[test]
fn harmonize_requires_project_for_bins() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let err = BatchBuilder::new(&settings)
        .build(&HarmonizeStage::from_labels(["chr2"]), &template(json!({})))
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::MissingTemplateKey { ref key, .. } if key == "Harmonize.project"
    ));
}

#[test]
fn harmonize_concat_is_a_single_unit() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let summary = BatchBuilder::new(&settings)
        .build(&HarmonizeStage::concat(), &template(json!({"Harmonize.project": "cohort"})))
        .unwrap();

    assert_eq!(summary.units, vec!["proj_run1"]);
    let inputs = read_json(&summary.input_files[0]);
    assert_eq!(inputs["Harmonize.project"], json!("cohort"));
    assert_eq!(
        inputs["Harmonize.deepvariantVCF"],
        json!("results/joint_genotype/deepvariant/deepvariant.concat.bcf.gz")
    );
    let options = read_json(&summary.options_files[0]);
    assert_eq!(options["final_call_logs_dir"], json!("logging/harmonize"));
}

#[test]
fn harmonize_concat_keys_are_bare_only_on_aws() {
    let dir = tempfile::tempdir().unwrap();
    let local = settings(&dir.path().join("local"));
    let aws = settings(&dir.path().join("aws")).with_environment(Environment::Aws);

    let summary = BatchBuilder::new(&local)
        .build(&HarmonizeStage::concat(), &template(json!({})))
        .unwrap();
    let inputs = read_json(&summary.input_files[0]);
    assert!(inputs.get("Harmonize.strelka2VCF").is_some());
    assert!(inputs.get("strelka2VCF").is_none());

    let summary = BatchBuilder::new(&aws)
        .build(&HarmonizeStage::concat(), &template(json!({})))
        .unwrap();
    let inputs = read_json(&summary.input_files[0]);
    assert_eq!(
        inputs["strelka2VCFIndex"],
        json!("results/joint_genotype/strelka2/strelka2.concat.bcf.gz.tbi")
    );
    assert!(inputs.get("Harmonize.strelka2VCF").is_none());
}

#[test]
fn harmonize_bins_from_bedfile() {
    let dir = tempfile::tempdir().unwrap();
    let bed = dir.path().join("intervals.bed");
    write_file(
        &bed,
        "chr1\t0\t60000000\nchr1\t60000000\t120000000\nchr1\t120000000\t180000000\nchr2\t0\t1000\n",
    );
    let stage = HarmonizeStage::from_bedfile(&bed, &IntervalBinner::default()).unwrap();
    assert_eq!(
        stage.bins().unwrap(),
        &["chr1.0", "chr1.1", "chr1.2", "chr2"].map(String::from)
    );
}
