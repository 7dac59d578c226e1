//! Defines the default passes available to [PassManager].
use crate::passes::{
    Cse, Fusion, ReuseSlots, ScheduleNodes, TranslateNodes, UnfoldConstants,
    WellFormed,
};
use crate::traversal::Named;
use crate::{pass_manager::PassManager, register_alias};
use cadence_utils::CadenceResult;

impl PassManager {
    pub fn default_passes() -> CadenceResult<Self> {
        // Construct the pass manager and register all passes.
        let mut pm = PassManager::default();

        // Compilation passes
        pm.register_pass::<ScheduleNodes>()?;
        pm.register_pass::<TranslateNodes>()?;

        // Optimization passes
        pm.register_pass::<UnfoldConstants>()?;
        pm.register_pass::<Cse>()?;
        pm.register_pass::<Fusion>()?;
        pm.register_pass::<ReuseSlots>()?;

        // Validation passes
        pm.register_diagnostic::<WellFormed>()?;

        register_alias!(pm, "compile", [ScheduleNodes, TranslateNodes]);
        register_alias!(
            pm,
            "opt",
            [UnfoldConstants, Cse, Fusion, ReuseSlots, WellFormed]
        );
        register_alias!(pm, "all", ["compile", "opt"]);
        register_alias!(pm, "no-opt", ["compile", WellFormed]);
        register_alias!(pm, "none", []);

        Ok(pm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::*;

    fn names(passes: &[&str]) -> Vec<String> {
        passes.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn aliases_expand_in_order() {
        let pm = PassManager::default_passes().unwrap();
        let help = pm.specific_help("all").unwrap();
        let expected = [
            "schedule",
            "translate",
            "unfold-constants",
            "cse",
            "fusion",
            "reuse-slots",
            "well-formed",
        ]
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");
        assert!(help.ends_with(&expected), "{help}");
        assert!(pm.complete_help().contains("* copies"));
    }

    #[test]
    fn unknown_passes_are_rejected() {
        let pm = PassManager::default_passes().unwrap();
        let mut ctx = context(vec![counter()]);
        assert!(pm
            .execute_plan(&mut ctx, &names(&["inline"]), &[], false)
            .is_err());

        let mut pm = PassManager::default();
        assert!(pm.add_alias("x".into(), names(&["nothing"])).is_err());
    }

    #[test]
    fn full_pipeline_preserves_behavior() {
        let pm = PassManager::default_passes().unwrap();
        let mut ctx = context(sample_nodes());
        ctx.extra_opts = vec!["unfold-constants:copies".to_string()];
        pm.execute_plan(&mut ctx, &names(&["all"]), &[], false)
            .unwrap();
        assert_samples_equivalent(&ctx);
    }

    #[test]
    fn disabled_passes_do_not_run() {
        let pm = PassManager::default_passes().unwrap();
        let mut ctx = context(sample_nodes());
        pm.execute_plan(&mut ctx, &names(&["all"]), &names(&["opt"]), false)
            .unwrap();
        let mut plain = context(sample_nodes());
        pm.execute_plan(&mut plain, &names(&["compile"]), &[], false)
            .unwrap();
        assert_eq!(ctx.machines, plain.machines);
    }
}
