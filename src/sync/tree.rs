// src/sync/tree.rs

//! Дерево подразделений из плоского списка со ссылками на родителя.

use crate::models::SourceDepartment;
use std::collections::HashMap;

const ROOT: usize = 0;

#[derive(Debug)]
struct Node {
    key: String,
    department: Option<SourceDepartment>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Дерево с синтетическим корнем `root_key`.
///
/// Порядок входа не важен: ребёнок может прийти раньше родителя, под него
/// заводится пустой узел-заглушка. Если заглушка так и не заполнилась,
/// её дети поднимаются под корень. Циклы разрываются там же.
#[derive(Debug)]
pub struct DepartmentTree {
    nodes: Vec<Node>,
    len: usize,
}

/// Родитель узла при обходе
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef<'a> {
    /// Узел висит прямо на точке привязки источника
    Anchor,
    Node(&'a SourceDepartment),
}

#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub department: &'a SourceDepartment,
    pub parent: ParentRef<'a>,
    pub depth: usize,
}

impl DepartmentTree {
    pub fn build(root_key: &str, departments: Vec<SourceDepartment>) -> Self {
        let mut tree = Self {
            nodes: vec![Node {
                key: root_key.to_string(),
                department: None,
                parent: None,
                children: Vec::new(),
            }],
            len: departments.len(),
        };
        let mut index: HashMap<String, usize> = HashMap::from([(root_key.to_string(), ROOT)]);

        let mut order = Vec::with_capacity(departments.len());
        for dept in departments {
            let node = tree.node_for(&mut index, &dept.source_dept_id);
            order.push(node);
            tree.nodes[node].department = Some(dept);
        }

        // Привязка к родителям в порядке входа
        for &node in &order {
            if node == ROOT {
                continue;
            }
            let parent_key = match &tree.nodes[node].department {
                Some(dept) => dept.source_dept_parent_id.clone(),
                None => continue,
            };
            let parent = tree.node_for(&mut index, &parent_key);
            tree.attach(node, parent);
        }

        tree.hoist_placeholder_children();
        tree.break_cycles(&order);
        tree
    }

    fn node_for(&mut self, index: &mut HashMap<String, usize>, key: &str) -> usize {
        if let Some(&idx) = index.get(key) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node {
            key: key.to_string(),
            department: None,
            parent: None,
            children: Vec::new(),
        });
        index.insert(key.to_string(), idx);
        idx
    }

    fn attach(&mut self, node: usize, parent: usize) {
        if let Some(old) = self.nodes[node].parent.take() {
            self.nodes[old].children.retain(|&c| c != node);
        }
        self.nodes[node].parent = Some(parent);
        self.nodes[parent].children.push(node);
    }

    fn is_placeholder(&self, idx: usize) -> bool {
        idx != ROOT && self.nodes[idx].department.is_none()
    }

    fn hoist_placeholder_children(&mut self) {
        for idx in 1..self.nodes.len() {
            if !self.is_placeholder(idx) {
                continue;
            }
            for child in std::mem::take(&mut self.nodes[idx].children) {
                self.nodes[child].parent = None;
                self.attach(child, ROOT);
            }
        }
    }

    /// Узлы, недостижимые из корня, образуют цикл: первый по входу
    /// поднимается под корень, остальные становятся достижимы через него.
    fn break_cycles(&mut self, order: &[usize]) {
        let mut reachable = vec![false; self.nodes.len()];
        self.mark_reachable(ROOT, &mut reachable);
        for &node in order {
            if node != ROOT && !reachable[node] {
                self.attach(node, ROOT);
                self.mark_reachable(node, &mut reachable);
            }
        }
    }

    fn mark_reachable(&self, from: usize, reachable: &mut [bool]) {
        let mut stack = vec![from];
        while let Some(idx) = stack.pop() {
            if reachable[idx] {
                continue;
            }
            reachable[idx] = true;
            stack.extend(self.nodes[idx].children.iter().copied());
        }
    }

    pub fn root_key(&self) -> &str {
        &self.nodes[ROOT].key
    }

    /// Есть ли у источника реальное подразделение с ключом корня
    pub fn has_real_root(&self) -> bool {
        self.nodes[ROOT].department.is_some()
    }

    /// Количество подразделений (без заглушек)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ключи детей узла в порядке обхода
    pub fn children_of(&self, key: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .find(|n| n.key == key)
            .map(|n| n.children.iter().map(|&c| self.nodes[c].key.as_str()).collect())
            .unwrap_or_default()
    }

    /// Прямой обход (родитель раньше детей) на явном стеке
    pub fn walk(&self) -> PreOrder<'_> {
        let stack = if self.has_real_root() {
            vec![(ROOT, None, 0)]
        } else {
            self.nodes[ROOT].children.iter().rev().map(|&c| (c, None, 0)).collect()
        };
        PreOrder { tree: self, stack }
    }
}

pub struct PreOrder<'a> {
    tree: &'a DepartmentTree,
    stack: Vec<(usize, Option<usize>, usize)>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (idx, parent, depth) = self.stack.pop()?;
            let node = &self.tree.nodes[idx];
            // заглушки после подъёма пусты; пропускаем на всякий случай
            let Some(department) = node.department.as_ref() else {
                continue;
            };
            self.stack
                .extend(node.children.iter().rev().map(|&c| (c, Some(idx), depth + 1)));
            let parent = match parent.and_then(|p| self.tree.nodes[p].department.as_ref()) {
                Some(dept) => ParentRef::Node(dept),
                None => ParentRef::Anchor,
            };
            return Some(Visit { department, parent, depth });
        }
    }
}
