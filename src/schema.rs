diesel::table! {
    annotations (sample_accession, key) {
        sample_accession -> Integer,
        key -> Text,
        val -> Text,
    }
}

diesel::table! {
    runs (run_accession) {
        run_accession -> Integer,
        run_date -> Date,
        machine_type -> Text,
        machine_kit -> Text,
        lane -> Integer,
        data_uri -> Text,
        comment -> Text,
        admin_comment -> Nullable<Text>,
    }
}

diesel::table! {
    samples (sample_accession) {
        sample_accession -> Integer,
        sample_name -> Text,
        run_accession -> Integer,
        barcode_sequence -> Text,
        primer_sequence -> Nullable<Text>,
        sample_type -> Nullable<Text>,
        subject_id -> Nullable<Text>,
        host_species -> Nullable<Text>,
    }
}

diesel::table! {
    standard_host_species (host_species) {
        host_species -> Text,
        scientific_name -> Text,
        ncbi_taxon_id -> Integer,
    }
}

diesel::table! {
    standard_sample_types (sample_type) {
        sample_type -> Text,
        rarity -> Text,
        host_associated -> Bool,
        description -> Text,
    }
}

diesel::joinable!(annotations -> samples (sample_accession));
diesel::joinable!(samples -> runs (run_accession));

diesel::allow_tables_to_appear_in_same_query!(
    annotations,
    runs,
    samples,
    standard_host_species,
    standard_sample_types,
);
