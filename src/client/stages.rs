/// One stage of the engine's declared pipeline: the name it uses on the
/// wire, the key the client stores it under, and the name shown in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDescriptor {
    pub wire: &'static str,
    pub key: &'static str,
    pub display_name: &'static str,
}

const fn stage(wire: &'static str, display_name: &'static str) -> StageDescriptor {
    StageDescriptor {
        wire,
        key: wire,
        display_name,
    }
}

/// In pipeline order.
pub const PIPELINE_STAGES: [StageDescriptor; 12] = [
    stage("storage", "StorageAgent"),
    stage("transcript", "TranscriptAgent"),
    stage("researcher", "ResearcherAgent"),
    stage("requirements", "RequirementsAgent"),
    stage("knowledge_base", "KnowledgeBaseAgent"),
    stage("prd", "PRDAgent"),
    stage("mockup", "MockupAgent"),
    stage("synthetic_data", "SyntheticDataAgent"),
    stage("commercial_proposal", "CommercialProposalAgent"),
    stage("bom", "BOMAgent"),
    stage("architecture_diagram", "ArchitectureDiagramAgent"),
    stage("reviewer", "ReviewerAgent"),
];

pub fn lookup_wire_stage(wire: &str) -> Option<&'static StageDescriptor> {
    PIPELINE_STAGES.iter().find(|stage| stage.wire == wire)
}

/// Unknown stage names pass through unchanged.
pub fn canonical_stage_key(wire: &str) -> String {
    lookup_wire_stage(wire)
        .map(|stage| stage.key.to_string())
        .unwrap_or_else(|| wire.to_string())
}

pub fn stage_display_name(key: &str) -> String {
    PIPELINE_STAGES
        .iter()
        .find(|stage| stage.key == key)
        .map(|stage| stage.display_name.to_string())
        .unwrap_or_else(|| key.to_string())
}

/// Position in the declared pipeline, `None` for engine-added stages.
pub fn pipeline_position(key: &str) -> Option<usize> {
    PIPELINE_STAGES.iter().position(|stage| stage.key == key)
}
