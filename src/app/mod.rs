pub mod campagne_use_case;
pub mod collaborateur_use_case;
pub mod evaluation_use_case;
pub mod fiche_use_case;
pub mod referentiel_use_case;

pub use campagne_use_case::{CampagneCreate, CampagneLaunch, CampagneUseCase};
pub use collaborateur_use_case::{
    CollaborateurCreate, CollaborateurImport, CollaborateurUpdate, CollaborateurUseCase,
    RowRejection,
};
pub use evaluation_use_case::{DetailUpdate, EvaluationUpdate, EvaluationUseCase};
pub use fiche_use_case::{FicheCreate, FicheUseCase};
pub use referentiel_use_case::{ImportPreview, ReferentielUseCase};
