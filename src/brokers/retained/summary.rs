use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct RetainedBrokerSummary {
    pub total_topics: usize,
    pub max_per_namespace: usize,
    pub namespaces: Vec<NamespaceSummary>,
}

#[derive(Serialize, Debug)]
pub struct NamespaceSummary {
    pub name: String,
    pub topics: usize,
    pub nodes: usize, // trie nodes below the root
}
