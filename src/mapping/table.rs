//! Mapping tables for the survey catalog layouts we ingest

use super::Cast::{Bool, Float, IntThenText, Text};
use super::MappingNode as N;

/// Catalog layout with best-available-fit sersic columns in every fitted band
pub fn multiband_mapping() -> N {
    N::group(vec![
        ("id", N::col("coadd_object_id", IntThenText)),
        ("ra", N::col("ra", Float)),
        ("dec", N::col("dec", Float)),
        ("reff", N::col("sersic_reff_arcsec__best_available_fit", Float)),
        (
            "reff_pixels",
            N::col("sersic_reff_pixels__best_available_fit", Float),
        ),
        ("q", N::col("sersic_q__best_available_fit", Float)),
        ("pa", N::col("sersic_PA__best_available_fit", Float)),
        ("nucleus", N::col("is_nucleated", Bool)),
        ("isActive", N::unsourced(Bool)),
        ("redshift_x", N::unsourced(Float)),
        ("redshift_y", N::unsourced(Float)),
        ("x", N::col("sersic_x__best_available_fit", Float)),
        ("y", N::col("sersic_y__best_available_fit", Float)),
        (
            "photometry",
            N::group(vec![
                (
                    "g",
                    N::group(vec![
                        ("sersic", g_band_sersic(true)),
                        ("source_extractor", source_extractor("g")),
                    ]),
                ),
                (
                    "r",
                    N::group(vec![
                        ("sersic", fitted_band_sersic("r", "sersic_mean_mue_r")),
                        ("source_extractor", source_extractor("r")),
                    ]),
                ),
                (
                    "i",
                    N::group(vec![
                        (
                            "sersic",
                            fitted_band_sersic("i", "sersic_mean_mue_i__best_available_fit"),
                        ),
                        ("source_extractor", source_extractor("i")),
                    ]),
                ),
                ("y", N::group(vec![("source_extractor", source_extractor("y"))])),
                ("z", N::group(vec![("source_extractor", source_extractor("z"))])),
            ]),
        ),
        ("misc", misc()),
        ("thuruthipilly", thuruthipilly()),
    ])
}

/// Earlier catalog layout: plain `_r`/`_i` sersic columns, no pixel radius
pub fn single_band_mapping() -> N {
    N::group(vec![
        ("id", N::col("coadd_object_id", IntThenText)),
        ("ra", N::col("ra", Float)),
        ("dec", N::col("dec", Float)),
        ("reff", N::col("sersic_reff_arcsec__best_available_fit", Float)),
        ("q", N::col("sersic_q__best_available_fit", Float)),
        ("pa", N::col("sersic_PA__best_available_fit", Float)),
        ("nucleus", N::col("is_nucleated", Bool)),
        ("isActive", N::unsourced(Bool)),
        ("redshift_x", N::unsourced(Float)),
        ("redshift_y", N::unsourced(Float)),
        ("x", N::col("sersic_x__best_available_fit", Float)),
        ("y", N::col("sersic_y__best_available_fit", Float)),
        (
            "photometry",
            N::group(vec![
                (
                    "g",
                    N::group(vec![
                        ("sersic", g_band_sersic(false)),
                        ("source_extractor", source_extractor("g")),
                    ]),
                ),
                (
                    "r",
                    N::group(vec![
                        ("sersic", plain_band_sersic("r")),
                        ("source_extractor", source_extractor("r")),
                    ]),
                ),
                (
                    "i",
                    N::group(vec![
                        ("sersic", plain_band_sersic("i")),
                        ("source_extractor", source_extractor("i")),
                    ]),
                ),
                ("y", N::group(vec![("source_extractor", source_extractor("y"))])),
                ("z", N::group(vec![("source_extractor", source_extractor("z"))])),
            ]),
        ),
        ("misc", misc()),
        ("thuruthipilly", thuruthipilly()),
    ])
}

/// g-band sersic block; the multiband layout also carries `x_rel_error`
fn g_band_sersic(with_x_rel_error: bool) -> N {
    let mut children = vec![
        ("mag", N::col("sersic_mag__best_available_fit", Float)),
        ("mag_error", N::col("sersic_mag_error__best_available_fit", Float)),
        (
            "mag_rel_error",
            N::col("sersic_mag_rel_error__best_available_fit", Float),
        ),
        ("mean_mue", N::col("sersic_mean_mue__best_available_fit", Float)),
        ("mue", N::col("sersic_mue__best_available_fit", Float)),
        ("x_error", N::col("sersic_x_error__best_available_fit", Float)),
    ];
    if with_x_rel_error {
        children.push((
            "x_rel_error",
            N::col("sersic_x_rel_error__best_available_fit", Float),
        ));
    }
    children.push((
        "psf",
        N::group(vec![
            ("mag", N::col("sersic_psf_mag__best_available_fit", Float)),
            (
                "mag_error",
                N::col("sersic_psf_mag_error__best_available_fit", Float),
            ),
            (
                "mag_rel_error",
                N::col("sersic_psf_mag_rel_error__best_available_fit", Float),
            ),
            ("x", N::col("sersic_psf_x__best_available_fit", Float)),
            (
                "x_error",
                N::col("sersic_psf_x_error__best_available_fit", Float),
            ),
            (
                "x_rel_error",
                N::col("sersic_psf_x_rel_error__best_available_fit", Float),
            ),
        ]),
    ));
    N::group(children)
}

/// r/i sersic block for the best-available-fit layout
fn fitted_band_sersic(band: &str, mean_mue_column: &str) -> N {
    let fit = |stem: &str| format!("{}_{}__best_available_fit", stem, band);
    N::group(vec![
        ("mean_mue", N::col(mean_mue_column, Float)),
        ("mue", N::col(fit("sersic_mue"), Float)),
        ("mag", N::col(fit("sersic_mag"), Float)),
        ("mag_error", N::col(fit("sersic_mag_error"), Float)),
        ("mag_rel_error", N::col(fit("sersic_mag_rel_error"), Float)),
        ("x_error", N::col(fit("sersic_x_error"), Float)),
        ("x_rel_error", N::col(fit("sersic_x_rel_error"), Float)),
        (
            "psf",
            N::group(vec![
                ("mag", N::col(fit("sersic_psf_mag"), Float)),
                ("mag_error", N::col(fit("sersic_psf_mag_error"), Float)),
            ]),
        ),
    ])
}

/// r/i sersic block for the plain-column layout
fn plain_band_sersic(band: &str) -> N {
    let plain = |stem: &str| format!("{}_{}", stem, band);
    N::group(vec![
        ("mean_mue", N::col(plain("sersic_mean_mue"), Float)),
        ("mue", N::col(plain("sersic_mue"), Float)),
        ("mag", N::col(plain("sersic_mag"), Float)),
        ("mag_error", N::col(plain("sersic_mag_error"), Float)),
        ("mag_rel_error", N::col(plain("sersic_mag_rel_error"), Float)),
        ("x_error", N::col(plain("sersic_x_error"), Float)),
        (
            "psf",
            N::group(vec![
                ("mag", N::col(plain("sersic_psf_mag"), Float)),
                ("mag_error", N::col(plain("sersic_psf_mag_error"), Float)),
            ]),
        ),
    ])
}

fn source_extractor(band: &str) -> N {
    N::group(vec![
        ("mag_auto", N::col(format!("mag_auto_{}", band), Float)),
        (
            "mu_mean_model",
            N::col(format!("mu_mean_model_{}", band), Float),
        ),
        (
            "flux_radius",
            N::col(format!("flux_radius_{}_arcsec", band), Float),
        ),
    ])
}

fn misc() -> N {
    N::group(vec![
        ("is_detr", N::col("is_detr", Bool)),
        ("is_vit", N::col("is_vit", Bool)),
        ("paper", N::col("paper", Text)),
        ("dataset", N::col("dataset", Text)),
        ("tilename", N::col("tilename", Text)),
        ("thur_cls", N::col("thur_cls", Text)),
        ("thur_cls_n", N::col("thur_cls_n", Float)),
    ])
}

fn thuruthipilly() -> N {
    N::group(vec![
        ("n", N::col("n_thur", Float)),
        ("q", N::col("q_thur", Float)),
        ("reff_g", N::col("reff_g_thur", Float)),
        ("reff_i", N::col("reff_i_thur", Float)),
        ("mag_g_cor", N::col("mag_g_cor_thur", Float)),
        ("mag_g_gf", N::col("mag_g_gf_thur", Float)),
        ("mag_i_cor", N::col("mag_i_cor_thur", Float)),
        ("mag_i_gf", N::col("mag_i_gf_thur", Float)),
        ("mue_mean_g_gf", N::col("mue_mean_g_gf_thur", Float)),
        ("mu_mean_g_cor", N::col("mu_mean_g_cor_thur", Float)),
        ("mue_mean_i_gf", N::col("mue_mean_i_gf_thur", Float)),
        ("mu_mean_i_cor", N::col("mu_mean_i_cor_thur", Float)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Cast;

    fn has_column(node: &N, column: &str) -> bool {
        node.source_columns().iter().any(|(c, _)| *c == column)
    }

    #[test]
    fn test_multiband_layout() {
        let table = multiband_mapping();

        assert!(has_column(&table, "sersic_reff_pixels__best_available_fit"));
        assert!(has_column(&table, "sersic_mag_r__best_available_fit"));
        assert!(has_column(&table, "sersic_x_rel_error_i__best_available_fit"));
        assert!(has_column(&table, "sersic_mean_mue_r"));
        assert!(has_column(&table, "flux_radius_z_arcsec"));

        let id = table.child("id").unwrap();
        assert_eq!(
            *id,
            N::Leaf {
                column: Some("coadd_object_id".to_string()),
                cast: Cast::IntThenText
            }
        );
    }

    #[test]
    fn test_single_band_layout() {
        let table = single_band_mapping();

        assert!(table.child("reff_pixels").is_none());
        assert!(has_column(&table, "sersic_mag_r"));
        assert!(has_column(&table, "sersic_mean_mue_i"));
        assert!(!has_column(&table, "sersic_mag_r__best_available_fit"));
        assert!(!has_column(&table, "sersic_x_rel_error__best_available_fit"));
    }

    #[test]
    fn test_columns_are_unique() {
        for table in [multiband_mapping(), single_band_mapping()] {
            let columns = table.source_columns();
            let mut names: Vec<_> = columns.iter().map(|(c, _)| *c).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(before, names.len());
        }
    }
}
